//! Core types for the commandsocket protocol.
//!
//! This crate provides the protocol primitives shared by the client-role
//! `Connection` and the server-role `Hub`: wire messages, the optionally
//! encrypted codec, request correlation, and the tracked editor state
//! snapshot. It knows nothing about sockets.

mod codec;
mod correlator;
mod message;
mod state;

pub use codec::{CodecError, decode, encode};
pub use correlator::{CorrelationRing, PendingTable};
pub use message::{
    AlertLevel, ClientRequest, ClientResponse, Correlated, HubRequest, HubResponse, StatePush,
};
pub use state::ClientState;

/// Default capacity of both correlation disciplines.
pub const CORRELATION_CAPACITY: usize = 100;

/// Lifecycle state of a client-role connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Before the first connect attempt.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Socket established.
    Open,
    /// Socket lost; a reconnect may be scheduled.
    Closed,
}

/// Status reported to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Connecting,
    Ok,
    Disconnected,
    ConnectionFailure,
    BadConfig,
}
