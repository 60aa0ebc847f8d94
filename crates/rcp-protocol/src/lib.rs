//! Parameter model and binary wire protocol for rcp.
//!
//! This crate defines everything two peers need to agree on, without any
//! notion of connections:
//!
//! - **Wire primitives** ([`wire`]): big-endian integers and floats plus
//!   tiny/short/long length-prefixed strings.
//! - **Type schemas** ([`TypeDefinition`]): per-datatype defaults, bounds,
//!   enum entries, and so on, with their encoding.
//! - **Parameters** ([`Parameter`]): one node of the control tree, with a
//!   change flag per optional field so only deltas go on the wire.
//! - **Packets** ([`Packet`]): the command envelope around a payload.
//! - **Registry** ([`ParameterRegistry`]): id allocation, the tree, and
//!   the dirty/removed sets drained on every sync tick.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Packet → Parameter proxy → ParameterRegistry::merge
//! ParameterRegistry::encode_dirty → Packet bytes → Transport
//! ```
//!
//! All multi-byte numbers on the wire are big-endian. Nothing here blocks
//! or spawns; the roles in the `rcp` crate drive a registry from a single
//! task.

mod error;
mod field;
mod packet;
mod parameter;
mod registry;
mod typedef;
mod types;
mod value;
pub mod wire;

pub use error::{ProtocolError, RegistryError};
pub use field::{Field, LocalizedText};
pub use packet::{encode_remove, encode_update, InfoData, Packet, PacketData, ValueUpdate};
pub use parameter::{Parameter, UpdatedCallback, ValueCallback};
pub use registry::{
    HierarchyNode, Merge, ParameterGuard, ParameterRegistry, MAX_HIERARCHY_DEPTH,
};
pub use typedef::{
    CustomDefinition, DefaultDefinition, EnumDefinition, NumberDefinition, NumberKind,
    RangeDefinition, StringDefinition, TypeDefinition, UriDefinition,
};
pub use types::{
    Color, Command, Datatype, NumberScale, PacketOption, ParameterId, ParameterOption,
    INFO_APPLICATION_ID,
};
pub use value::{Number, RangeValue, Scalar, Value};
