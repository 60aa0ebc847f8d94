//! # rcp
//!
//! Remote parameter control: a server exposes a tree of typed parameters
//! and any number of clients mirror it and edit it.
//!
//! The crate ties the layers together:
//! transport ([`rcp_transport`]) → packets and registry ([`rcp_protocol`])
//! → server and client roles (this crate).
//!
//! Neither role spawns or blocks. Call `poll()` to handle what arrived and
//! `update()` to push local changes, once per tick of your own loop.
//!
//! The default `websocket` feature enables the WebSocket transporters.
//! Without it only the in-memory transporters are built.
//!
//! ## Quick Start
//!
//! ```rust
//! use rcp::prelude::*;
//!
//! let network = MemoryNetwork::new();
//! let mut transporter = network.server();
//! transporter.bind(10000)?;
//!
//! let mut server = ParameterServer::builder().transporter(transporter).build();
//! let gain = server.create_parameter(TypeDefinition::number::<f32>(), None)?;
//! {
//!     let mut parameter = server.parameter_mut(gain)?;
//!     parameter.set_label("gain");
//!     parameter.set_value(0.5f32)?;
//! }
//!
//! let mut client = ParameterClient::new(network.client());
//! client.connect("localhost", 10000)?;
//! client.poll();
//! server.poll();
//! client.poll();
//! assert_eq!(client.get(gain).and_then(|p| p.label()), Some("gain"));
//! # Ok::<(), RcpError>(())
//! ```

mod client;
mod error;
mod server;

pub use client::{ClientListener, ParameterClient};
pub use error::RcpError;
pub use server::{
    ParameterServer, ParameterServerBuilder, ServerConfig, TransporterId, PROTOCOL_VERSION,
};

pub use rcp_protocol;
pub use rcp_transport;

/// Common imports for embedding a server or a client.
pub mod prelude {
    pub use crate::{
        ClientListener, ParameterClient, ParameterServer, ParameterServerBuilder, RcpError,
        ServerConfig, TransporterId,
    };
    pub use rcp_protocol::{
        Color, Datatype, HierarchyNode, InfoData, Parameter, ParameterId, RangeValue,
        TypeDefinition, Value,
    };
    pub use rcp_transport::{ClientTransporter, ConnectionId, MemoryNetwork, ServerTransporter};
    #[cfg(feature = "websocket")]
    pub use rcp_transport::{WebSocketClientTransporter, WebSocketServerTransporter};
}
