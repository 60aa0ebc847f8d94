use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the listening socket failed.
    #[error("bind to port {port} failed: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// No listener is registered on the requested port.
    #[error("nothing listening on port {0}")]
    ConnectionRefused(u16),

    /// The server transporter is not bound.
    #[error("transporter is not bound")]
    NotBound,

    /// The client transporter has no open connection.
    #[error("transporter is not connected")]
    NotConnected,

    /// The connection id does not belong to this transporter.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The async transporters need a tokio runtime to run their I/O on.
    #[error("no tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
