//! Server-side hub for the commandsocket protocol.
//!
//! A [`Hub`] accepts many editor clients, tracks each one's pushed state,
//! elects a single primary through focus reports, and routes outbound
//! requests to that primary only.

mod hub;

pub use hub::{Hub, HubConfig, HubError, HubEvent, RequestError};

pub use commandsocket_core::{
    AlertLevel, ClientState, HostStatus, HubRequest, HubResponse, StatePush,
};
