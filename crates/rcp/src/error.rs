//! Unified error type for rcp.

use rcp_protocol::{ProtocolError, RegistryError};
use rcp_transport::TransportError;

use crate::TransporterId;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RcpError {
    /// A transport-level error (bind, connect, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error (encode, decode, value shape).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry error (ids, tree structure, merges).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No transporter with this id is attached to the server.
    #[error("unknown transporter {0}")]
    UnknownTransporter(TransporterId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_protocol::{Datatype, ParameterId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let rcp_err: RcpError = err.into();
        assert!(matches!(rcp_err, RcpError::Transport(_)));
        assert!(rcp_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::NoValue(Datatype::Bang);
        let rcp_err: RcpError = err.into();
        assert!(matches!(rcp_err, RcpError::Protocol(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::NotFound(ParameterId(4));
        let rcp_err: RcpError = err.into();
        assert!(matches!(rcp_err, RcpError::Registry(_)));
        assert_eq!(rcp_err.to_string(), "parameter param-4 not found");
    }
}
