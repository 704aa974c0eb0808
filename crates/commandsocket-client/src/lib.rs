//! Client-side implementation of the commandsocket protocol.
//!
//! A [`Connection`] owns one outbound WebSocket to an editor, drives the
//! connect / open / closed lifecycle with timed reconnection, and correlates
//! requests to responses through a fixed-size ring.

mod connection;

pub use connection::{ClientConfig, ClientEvent, Connection};

pub use commandsocket_core::{ConnectionState, HostStatus};
