//! Transporter abstraction for rcp.
//!
//! A transporter carries whole messages between peers. The protocol core
//! never awaits: it hands outgoing bytes to a transporter and polls it for
//! incoming ones once per tick. Implementations that do real network I/O
//! run it on a tokio runtime and hand data over through channels.
//!
//! - [`ServerTransporter`]: listens on a port, many connections.
//! - [`ClientTransporter`]: one connection to a server.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory`]: in-process channels, for tests and embedding.
//! - `websocket` (default feature): binary WebSocket frames via
//!   `tokio-tungstenite`.

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryClientTransporter, MemoryNetwork, MemoryServerTransporter};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketClientTransporter, WebSocketServerTransporter};

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One message received by a server transporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub connection: ConnectionId,
    pub data: Vec<u8>,
}

/// What a client transporter reports when polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection to the server is open.
    Connected,
    /// The connection closed, from either side.
    Disconnected,
    /// One message from the server.
    Received(Vec<u8>),
}

/// The server side of a transport: one listener, many connections.
pub trait ServerTransporter: Send + 'static {
    /// Starts listening on `port`.
    fn bind(&mut self, port: u16) -> Result<(), TransportError>;

    /// Stops listening and closes every connection.
    fn unbind(&mut self);

    /// Sends one message to a single connection.
    fn send_to_one(&self, data: &[u8], connection: ConnectionId) -> Result<(), TransportError>;

    /// Sends one message to every connection except `exclude`.
    fn send_to_all(&self, data: &[u8], exclude: Option<ConnectionId>);

    fn connection_count(&self) -> usize;

    /// Takes the next received message, if any. Never blocks.
    fn try_recv(&mut self) -> Option<Received>;
}

/// The client side of a transport: one connection.
pub trait ClientTransporter: Send + 'static {
    /// Starts connecting. Completion is reported as
    /// [`ClientEvent::Connected`].
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Closes the connection and reports [`ClientEvent::Disconnected`].
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Takes the next event, if any. Never blocks.
    fn try_recv(&mut self) -> Option<ClientEvent>;
}

/// Locks a mutex shared with I/O tasks. A panicking task cannot leave the
/// connection maps half-updated, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
