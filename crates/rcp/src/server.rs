//! `ParameterServer` builder and sync loop.
//!
//! A server owns the authoritative parameter tree and any number of
//! transporters. The embedder drives it with two calls per tick:
//!
//! ```text
//! poll()    transporters → Packet → registry (INITIALIZE, UPDATE, INFO)
//! update()  registry dirty/removed sets → REMOVE/UPDATE packets → everyone
//! ```

use std::collections::BTreeMap;
use std::fmt;

use rcp_protocol::{
    Command, HierarchyNode, InfoData, Packet, Parameter, ParameterGuard, ParameterId,
    ParameterRegistry, ProtocolError, RegistryError, TypeDefinition, ValueUpdate,
};
use rcp_transport::{ConnectionId, ServerTransporter};
use serde::{Deserialize, Serialize};

use crate::RcpError;

/// The version reported to clients when none is configured.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the server reports in reply to `INFO` and `VERSION` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Protocol version string sent to clients.
    pub version: String,

    /// Optional identifier of the exposing application.
    pub application_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            application_id: None,
        }
    }
}

impl ServerConfig {
    fn info(&self) -> InfoData {
        InfoData {
            version: self.version.clone(),
            application_id: self.application_id.clone(),
        }
    }
}

/// Handle for a transporter attached to a [`ParameterServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransporterId(u32);

impl fmt::Display for TransporterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transporter-{}", self.0)
    }
}

/// Builder for configuring a [`ParameterServer`].
///
/// # Example
///
/// ```
/// use rcp::prelude::*;
///
/// let network = MemoryNetwork::new();
/// let mut transporter = network.server();
/// transporter.bind(10000).unwrap();
///
/// let server = ParameterServer::builder()
///     .application_id("mixer")
///     .transporter(transporter)
///     .build();
/// assert_eq!(server.config().application_id.as_deref(), Some("mixer"));
/// ```
pub struct ParameterServerBuilder {
    config: ServerConfig,
    transporters: Vec<Box<dyn ServerTransporter>>,
}

impl ParameterServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            transporters: Vec::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn application_id(mut self, application_id: impl Into<String>) -> Self {
        self.config.application_id = Some(application_id.into());
        self
    }

    /// Attaches an already bound transporter.
    pub fn transporter(mut self, transporter: impl ServerTransporter) -> Self {
        self.transporters.push(Box::new(transporter));
        self
    }

    pub fn build(self) -> ParameterServer {
        let mut server = ParameterServer::new(self.config);
        for transporter in self.transporters {
            server.attach(transporter);
        }
        server
    }
}

impl Default for ParameterServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative side of the protocol.
///
/// Parameters are addressed by the [`ParameterId`] returned when they are
/// created. Local changes made through [`parameter_mut`](Self::parameter_mut)
/// or [`remove`](Self::remove) reach clients on the next
/// [`update`](Self::update).
pub struct ParameterServer {
    config: ServerConfig,
    registry: ParameterRegistry,
    transporters: BTreeMap<TransporterId, Box<dyn ServerTransporter>>,
    next_transporter: u32,
}

impl ParameterServer {
    /// Creates a new builder.
    pub fn builder() -> ParameterServerBuilder {
        ParameterServerBuilder::new()
    }

    /// Creates a server without transporters.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: ParameterRegistry::new(),
            transporters: BTreeMap::new(),
            next_transporter: 0,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // -- Transporters ----------------------------------------------------

    /// Attaches a transporter. It should already be bound.
    pub fn add_transporter(&mut self, transporter: impl ServerTransporter) -> TransporterId {
        self.attach(Box::new(transporter))
    }

    fn attach(&mut self, transporter: Box<dyn ServerTransporter>) -> TransporterId {
        self.next_transporter += 1;
        let id = TransporterId(self.next_transporter);
        self.transporters.insert(id, transporter);
        tracing::debug!(%id, "transporter attached");
        id
    }

    /// Detaches a transporter and hands it back, still bound.
    pub fn remove_transporter(
        &mut self,
        id: TransporterId,
    ) -> Result<Box<dyn ServerTransporter>, RcpError> {
        let transporter = self
            .transporters
            .remove(&id)
            .ok_or(RcpError::UnknownTransporter(id))?;
        tracing::debug!(%id, "transporter detached");
        Ok(transporter)
    }

    pub fn transporter_count(&self) -> usize {
        self.transporters.len()
    }

    /// Connections summed over every transporter.
    pub fn connection_count(&self) -> usize {
        self.transporters
            .values()
            .map(|transporter| transporter.connection_count())
            .sum()
    }

    // -- Parameters ------------------------------------------------------

    /// Exposes a new parameter under `parent` (the root when `None`).
    pub fn create_parameter(
        &mut self,
        definition: TypeDefinition,
        parent: Option<ParameterId>,
    ) -> Result<ParameterId, RcpError> {
        Ok(self.registry.create(definition, parent)?)
    }

    pub fn create_group(&mut self, parent: Option<ParameterId>) -> Result<ParameterId, RcpError> {
        Ok(self.registry.create_group(parent)?)
    }

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.registry.get(id)
    }

    /// Borrows a parameter for changes. See [`ParameterGuard`].
    pub fn parameter_mut(&mut self, id: ParameterId) -> Result<ParameterGuard<'_>, RcpError> {
        Ok(self.registry.parameter_mut(id)?)
    }

    /// Moves a parameter into another group (the root when `None`).
    pub fn move_parameter(
        &mut self,
        id: ParameterId,
        parent: Option<ParameterId>,
    ) -> Result<(), RcpError> {
        Ok(self.registry.move_to(id, parent)?)
    }

    /// Removes a parameter and its subtree. Clients are told on the next
    /// [`update`](Self::update).
    pub fn remove(&mut self, id: ParameterId) -> Result<bool, RcpError> {
        Ok(self.registry.remove(id)?)
    }

    pub fn hierarchy(&self) -> HierarchyNode {
        self.registry.hierarchy()
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    // -- Inbound ---------------------------------------------------------

    /// Drains every transporter and handles what arrived. Returns the
    /// number of messages handled.
    pub fn poll(&mut self) -> usize {
        let ids: Vec<TransporterId> = self.transporters.keys().copied().collect();
        let mut handled = 0;
        for id in ids {
            while let Some(message) = self
                .transporters
                .get_mut(&id)
                .and_then(|transporter| transporter.try_recv())
            {
                self.received(id, message.connection, &message.data);
                handled += 1;
            }
        }
        handled
    }

    /// Handles one message from `connection` on `transporter`.
    ///
    /// Malformed input is logged and dropped; nothing here fails.
    pub fn received(&mut self, transporter: TransporterId, connection: ConnectionId, data: &[u8]) {
        let packet = match Packet::from_bytes(data) {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                tracing::debug!(%connection, "ignoring packet with invalid command");
                return;
            }
            Err(e) => {
                tracing::warn!(%connection, error = %e, "dropping malformed packet");
                return;
            }
        };

        match packet.command {
            Command::Initialize => self.send_initialize(transporter, connection),
            Command::Update => {
                let Some(parameter) = packet.into_parameter() else {
                    tracing::warn!(%connection, "update without parameter");
                    return;
                };
                let id = parameter.id();
                match self.registry.merge(parameter) {
                    Ok(merge) => {
                        tracing::debug!(%connection, %id, ?merge, "client update merged");
                        self.rebroadcast(transporter, connection, data);
                    }
                    Err(e) => tracing::warn!(%connection, %id, error = %e, "client update rejected"),
                }
            }
            Command::Info | Command::Version => {
                self.send_info(transporter, connection);
            }
            Command::Remove => {
                tracing::warn!(%connection, id = ?packet.id(), "clients may not remove parameters");
            }
            Command::Discover | Command::UpdateValue => {
                tracing::debug!(%connection, command = ?packet.command, "ignoring command");
            }
        }
    }

    fn send_initialize(&mut self, transporter: TransporterId, connection: ConnectionId) {
        let packets = self.registry.encode_all();
        let Some(target) = self.transporters.get(&transporter) else {
            return;
        };
        tracing::debug!(%connection, parameters = packets.len(), "sending initial dump");
        for bytes in &packets {
            if let Err(e) = target.send_to_one(bytes, connection) {
                tracing::warn!(%connection, error = %e, "initial dump aborted");
                return;
            }
        }
    }

    fn send_info(&self, transporter: TransporterId, connection: ConnectionId) {
        let Some(target) = self.transporters.get(&transporter) else {
            return;
        };
        let bytes = match Packet::info(self.config.info()).to_bytes(true) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode server info");
                return;
            }
        };
        if let Err(e) = target.send_to_one(&bytes, connection) {
            tracing::debug!(%connection, error = %e, "info reply not delivered");
        }
    }

    /// Forwards a client's bytes to everyone but the sender.
    fn rebroadcast(&self, origin: TransporterId, sender: ConnectionId, data: &[u8]) {
        for (id, transporter) in &self.transporters {
            let exclude = (*id == origin).then_some(sender);
            transporter.send_to_all(data, exclude);
        }
    }

    // -- Outbound --------------------------------------------------------

    /// Sends pending removals, then pending changes, to every connection.
    /// Returns the number of packets sent.
    ///
    /// With no transporter attached nothing is drained, so changes made
    /// before the first transporter are not lost.
    pub fn update(&mut self) -> usize {
        if self.transporters.is_empty() || !self.registry.has_pending() {
            return 0;
        }
        let mut packets = self.registry.encode_removed();
        packets.extend(self.registry.encode_dirty());
        for bytes in &packets {
            self.broadcast(bytes);
        }
        tracing::trace!(packets = packets.len(), "sync tick");
        packets.len()
    }

    /// Pushes a parameter's current value as a compact `UPDATEVALUE`.
    ///
    /// The parameter's pending changes stay queued for the next
    /// [`update`](Self::update).
    pub fn send_value(&self, id: ParameterId) -> Result<(), RcpError> {
        let parameter = self
            .registry
            .get(id)
            .ok_or(RegistryError::NotFound(id))?;
        let update = ValueUpdate::from_parameter(parameter)
            .ok_or(ProtocolError::UnsupportedDatatype(parameter.datatype()))?;
        let bytes = Packet::update_value(update).to_bytes(true)?;
        self.broadcast(&bytes);
        Ok(())
    }

    fn broadcast(&self, bytes: &[u8]) {
        for transporter in self.transporters.values() {
            transporter.send_to_all(bytes, None);
        }
    }
}

impl fmt::Debug for ParameterServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterServer")
            .field("config", &self.config)
            .field("parameters", &self.registry.len())
            .field("transporters", &self.transporters.len())
            .finish()
    }
}
