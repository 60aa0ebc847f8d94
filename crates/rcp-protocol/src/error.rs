//! Error types for the protocol layer.
//!
//! Two enums live here. [`ProtocolError`] covers everything that can go
//! wrong while turning bytes into packets, parameters, and type schemas.
//! [`RegistryError`] covers the bookkeeping side: id allocation and tree
//! structure. Neither is ever fatal to a peer; the server and client log
//! them and drop the offending message.

use crate::{Datatype, ParameterId};

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The input ended before a complete value could be read.
    ///
    /// Messages are self-delimiting, so this almost always means the
    /// sender produced a truncated frame. The message is discarded.
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A datatype byte outside the valid range.
    #[error("unknown datatype code {0:#04x}")]
    UnknownDatatype(u8),

    /// A recognised datatype that has no schema implementation
    /// (vectors, arrays, lists).
    #[error("datatype {0:?} is not supported")]
    UnsupportedDatatype(Datatype),

    /// An option code that is not valid in the block being parsed.
    #[error("unknown {context} option {code:#04x}")]
    UnknownOption { context: &'static str, code: u8 },

    /// Range parameters only accept numeric element types.
    #[error("datatype {0:?} cannot be used as a range element")]
    InvalidRangeElement(Datatype),

    /// A value was assigned to a parameter of an incompatible datatype.
    #[error("value does not fit datatype {expected:?}")]
    ValueMismatch { expected: Datatype },

    /// Bang and group parameters carry no value.
    #[error("datatype {0:?} carries no value")]
    NoValue(Datatype),

    /// The message is structurally valid but semantically wrong.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Errors raised by [`ParameterRegistry`](crate::ParameterRegistry).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// All 65,535 non-zero ids are taken.
    #[error("parameter id space exhausted")]
    IdSpaceExhausted,

    /// No parameter with this id is registered.
    #[error("parameter {0} not found")]
    NotFound(ParameterId),

    /// The id names a parameter that cannot hold children.
    #[error("parameter {0} is not a group")]
    NotAGroup(ParameterId),

    /// The root group is fixed for the lifetime of the registry.
    #[error("the root group cannot be modified this way")]
    RootImmutable,

    /// Moving a group below one of its own descendants.
    #[error("parameter {0} cannot be moved into its own subtree")]
    Cycle(ParameterId),

    /// An incoming update disagrees with the cached parameter's datatype.
    #[error("parameter {id} has datatype {expected:?}, update carries {found:?}")]
    DatatypeMismatch {
        id: ParameterId,
        expected: Datatype,
        found: Datatype,
    },

    /// A value assignment was rejected by the type schema.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_end_display_mentions_counts() {
        let err = ProtocolError::UnexpectedEnd {
            needed: 4,
            remaining: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains('1'));
    }

    #[test]
    fn test_registry_error_from_protocol_error() {
        let err: RegistryError =
            ProtocolError::ValueMismatch { expected: Datatype::Boolean }.into();
        assert!(matches!(err, RegistryError::Protocol(_)));
    }

    #[test]
    fn test_not_found_display_uses_parameter_id() {
        let err = RegistryError::NotFound(ParameterId(9));
        assert_eq!(err.to_string(), "parameter param-9 not found");
    }
}
