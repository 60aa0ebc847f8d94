//! `ParameterClient`: a mirror of a server's parameter tree.
//!
//! The client keeps a cache built from the server's `UPDATE` and `REMOVE`
//! packets and reports every change to its [`ClientListener`]s. Local
//! edits go back upstream on [`update`](ParameterClient::update).

use std::collections::VecDeque;

use rcp_protocol::{
    Command, HierarchyNode, InfoData, Merge, Packet, PacketData, Parameter, ParameterGuard,
    ParameterId, ParameterRegistry,
};
use rcp_transport::{ClientEvent, ClientTransporter};

use crate::RcpError;

/// Receives cache changes from a [`ParameterClient`].
///
/// Every method has an empty default, so implementors only override what
/// they care about. Listeners run inside [`ParameterClient::poll`].
pub trait ClientListener: Send {
    /// A parameter the client had not seen before.
    fn parameter_added(&mut self, _parameter: &Parameter) {}

    /// A cached parameter changed.
    fn parameter_updated(&mut self, _parameter: &Parameter) {}

    /// A parameter left the cache. Called once per evicted descendant too.
    fn parameter_removed(&mut self, _parameter: &Parameter) {}

    /// The server answered the version request.
    fn server_info(&mut self, _info: &InfoData) {}

    fn connected(&mut self) {}

    /// The connection closed. The cache is already empty.
    fn disconnected(&mut self) {}
}

/// The mirroring side of the protocol.
pub struct ParameterClient<T: ClientTransporter> {
    transporter: T,
    registry: ParameterRegistry,
    listeners: Vec<Box<dyn ClientListener>>,
    server_info: Option<InfoData>,
    /// Encoded updates not yet accepted by the transporter, oldest first.
    outbox: VecDeque<Vec<u8>>,
}

impl<T: ClientTransporter> ParameterClient<T> {
    pub fn new(transporter: T) -> Self {
        Self {
            transporter,
            registry: ParameterRegistry::new(),
            listeners: Vec::new(),
            server_info: None,
            outbox: VecDeque::new(),
        }
    }

    pub fn add_listener(&mut self, listener: impl ClientListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn transporter(&self) -> &T {
        &self.transporter
    }

    // -- Connection ------------------------------------------------------

    /// Connects the transporter. The handshake starts once it reports the
    /// connection open, on a later [`poll`](Self::poll).
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), RcpError> {
        self.transporter.connect(host, port)?;
        Ok(())
    }

    /// Disconnects and empties the cache.
    pub fn disconnect(&mut self) {
        self.transporter.disconnect();
        self.reset();
    }

    pub fn is_connected(&self) -> bool {
        self.transporter.is_connected()
    }

    /// What the server reported about itself, once known.
    pub fn server_info(&self) -> Option<&InfoData> {
        self.server_info.as_ref()
    }

    // -- Cache -----------------------------------------------------------

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.registry.get(id)
    }

    /// Borrows a cached parameter for changes, which are sent upstream on
    /// the next [`update`](Self::update).
    pub fn parameter_mut(&mut self, id: ParameterId) -> Result<ParameterGuard<'_>, RcpError> {
        Ok(self.registry.parameter_mut(id)?)
    }

    pub fn hierarchy(&self) -> HierarchyNode {
        self.registry.hierarchy()
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Whether local changes are still waiting to go upstream.
    pub fn has_pending(&self) -> bool {
        !self.outbox.is_empty() || self.registry.has_pending()
    }

    fn reset(&mut self) {
        self.registry.clear();
        self.server_info = None;
        self.outbox.clear();
    }

    // -- Inbound ---------------------------------------------------------

    /// Drains the transporter and handles every event. Returns the number
    /// of events handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.transporter.try_recv() {
            match event {
                ClientEvent::Connected => self.on_connected(),
                ClientEvent::Disconnected => {
                    tracing::debug!("server connection closed");
                    self.reset();
                    for listener in &mut self.listeners {
                        listener.disconnected();
                    }
                }
                ClientEvent::Received(data) => self.received(&data),
            }
            handled += 1;
        }
        handled
    }

    fn on_connected(&mut self) {
        tracing::debug!("connected, requesting version and parameters");
        for listener in &mut self.listeners {
            listener.connected();
        }
        for mut request in [Packet::info_request(), Packet::initialize_request()] {
            let sent = request
                .to_bytes(true)
                .map_err(RcpError::from)
                .and_then(|bytes| Ok(self.transporter.send(&bytes)?));
            if let Err(e) = sent {
                tracing::warn!(command = ?request.command, error = %e, "handshake request failed");
            }
        }
    }

    /// Handles one message from the server.
    ///
    /// Malformed input is logged and dropped; nothing here fails.
    pub fn received(&mut self, data: &[u8]) {
        let packet = match Packet::from_bytes(data) {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                tracing::debug!("ignoring packet with invalid command");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed packet");
                return;
            }
        };

        match packet.command {
            Command::Update => {
                let Some(parameter) = packet.into_parameter() else {
                    tracing::warn!("update without parameter");
                    return;
                };
                self.on_update(parameter);
            }
            Command::Remove => match packet.id() {
                Some(id) => self.on_remove(id),
                None => tracing::warn!("remove without id"),
            },
            Command::Info | Command::Version => match packet.data {
                Some(PacketData::Info(info)) => {
                    tracing::debug!(version = %info.version, "server info received");
                    for listener in &mut self.listeners {
                        listener.server_info(&info);
                    }
                    self.server_info = Some(info);
                }
                _ => tracing::debug!("ignoring version request from server"),
            },
            Command::UpdateValue => {
                let Some(PacketData::Value(update)) = packet.data else {
                    return;
                };
                match self.registry.apply_value(&update) {
                    Ok(true) => self.notify_updated(update.id),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(id = %update.id, error = %e, "value update rejected"),
                }
            }
            Command::Initialize | Command::Discover => {
                tracing::debug!(command = ?packet.command, "ignoring command");
            }
        }
    }

    fn on_update(&mut self, parameter: Parameter) {
        let id = parameter.id();
        match self.registry.merge(parameter) {
            Ok(Merge::Added) => {
                if let Some(parameter) = self.registry.get(id) {
                    for listener in &mut self.listeners {
                        listener.parameter_added(parameter);
                    }
                }
            }
            Ok(Merge::Updated) => self.notify_updated(id),
            Ok(Merge::Unchanged) => {}
            Err(e) => tracing::warn!(%id, error = %e, "server update rejected"),
        }
    }

    fn on_remove(&mut self, id: ParameterId) {
        if !self.registry.contains(id) {
            tracing::debug!(%id, "remove for unknown parameter");
            return;
        }
        for parameter in self.registry.remove_direct(id) {
            for listener in &mut self.listeners {
                listener.parameter_removed(&parameter);
            }
        }
    }

    fn notify_updated(&mut self, id: ParameterId) {
        let Some(parameter) = self.registry.get(id) else {
            return;
        };
        for listener in &mut self.listeners {
            listener.parameter_updated(parameter);
        }
    }

    // -- Outbound --------------------------------------------------------

    /// Sends local changes upstream as delta `UPDATE` packets. Returns the
    /// number of packets sent.
    ///
    /// Clients cannot remove parameters on the server, so pending local
    /// removals are discarded. While disconnected nothing is drained. When
    /// a send fails, that packet and everything after it stay queued and go
    /// out first on the next call.
    pub fn update(&mut self) -> Result<usize, RcpError> {
        if !self.transporter.is_connected() || !self.has_pending() {
            return Ok(0);
        }
        let removed = self.registry.encode_removed();
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "discarding local removals");
        }
        self.outbox.extend(self.registry.encode_dirty());

        let mut sent = 0;
        while let Some(bytes) = self.outbox.front() {
            if let Err(e) = self.transporter.send(bytes) {
                tracing::warn!(queued = self.outbox.len(), error = %e, "update send failed");
                return Err(e.into());
            }
            self.outbox.pop_front();
            sent += 1;
        }
        Ok(sent)
    }
}
