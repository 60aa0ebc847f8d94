//! In-process transporters backed by tokio channels.
//!
//! A [`MemoryNetwork`] stands in for the operating system's port table:
//! servers bind ports on it and clients connect to those ports. Messages
//! are delivered through unbounded `tokio::sync::mpsc` channels, so both
//! sides are usable from plain synchronous code and from inside a runtime.
//!
//! ```
//! use rcp_transport::{ClientEvent, ClientTransporter, MemoryNetwork, ServerTransporter};
//!
//! let network = MemoryNetwork::new();
//! let mut server = network.server();
//! server.bind(10000).unwrap();
//!
//! let mut client = network.client();
//! client.connect("localhost", 10000).unwrap();
//! assert_eq!(client.try_recv(), Some(ClientEvent::Connected));
//!
//! client.send(&[1, 0]).unwrap();
//! assert_eq!(server.try_recv().unwrap().data, vec![1, 0]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    lock, ClientEvent, ClientTransporter, ConnectionId, Received, ServerTransporter,
    TransportError,
};

/// The server half of a port binding.
struct Listener {
    connections: Mutex<BTreeMap<ConnectionId, UnboundedSender<ClientEvent>>>,
    inbound: UnboundedSender<Received>,
}

/// A set of ports that memory transporters bind and connect to.
///
/// Clones share the same ports.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<u16, Arc<Listener>>>>,
    next_connection: Arc<AtomicU64>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self) -> MemoryServerTransporter {
        MemoryServerTransporter {
            network: self.clone(),
            bound: None,
            inbound: None,
        }
    }

    pub fn client(&self) -> MemoryClientTransporter {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        MemoryClientTransporter {
            network: self.clone(),
            events_tx,
            events_rx,
            link: None,
        }
    }

    fn listener(&self, port: u16) -> Option<Arc<Listener>> {
        lock(&self.listeners).get(&port).cloned()
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct MemoryServerTransporter {
    network: MemoryNetwork,
    bound: Option<(u16, Arc<Listener>)>,
    inbound: Option<UnboundedReceiver<Received>>,
}

impl MemoryServerTransporter {
    /// The bound port, if any.
    pub fn port(&self) -> Option<u16> {
        self.bound.as_ref().map(|(port, _)| *port)
    }

    fn listener(&self) -> Result<&Listener, TransportError> {
        self.bound
            .as_ref()
            .map(|(_, listener)| listener.as_ref())
            .ok_or(TransportError::NotBound)
    }
}

impl ServerTransporter for MemoryServerTransporter {
    fn bind(&mut self, port: u16) -> Result<(), TransportError> {
        self.unbind();

        let mut listeners = lock(&self.network.listeners);
        if listeners.contains_key(&port) {
            return Err(TransportError::BindFailed {
                port,
                source: std::io::ErrorKind::AddrInUse.into(),
            });
        }
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let listener = Arc::new(Listener {
            connections: Mutex::new(BTreeMap::new()),
            inbound: inbound_tx,
        });
        listeners.insert(port, Arc::clone(&listener));
        drop(listeners);

        self.bound = Some((port, listener));
        self.inbound = Some(inbound_rx);
        tracing::debug!(port, "memory transporter bound");
        Ok(())
    }

    fn unbind(&mut self) {
        let Some((port, listener)) = self.bound.take() else {
            return;
        };
        lock(&self.network.listeners).remove(&port);
        let connections = std::mem::take(&mut *lock(&listener.connections));
        for client in connections.values() {
            let _ = client.send(ClientEvent::Disconnected);
        }
        self.inbound = None;
        tracing::debug!(port, closed = connections.len(), "memory transporter unbound");
    }

    fn send_to_one(&self, data: &[u8], connection: ConnectionId) -> Result<(), TransportError> {
        let listener = self.listener()?;
        let connections = lock(&listener.connections);
        let client = connections
            .get(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        client
            .send(ClientEvent::Received(data.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed(connection.to_string()))
    }

    fn send_to_all(&self, data: &[u8], exclude: Option<ConnectionId>) {
        let Ok(listener) = self.listener() else {
            return;
        };
        for (id, client) in lock(&listener.connections).iter() {
            if Some(*id) == exclude {
                continue;
            }
            if client.send(ClientEvent::Received(data.to_vec())).is_err() {
                tracing::debug!(%id, "dropping message for closed connection");
            }
        }
    }

    fn connection_count(&self) -> usize {
        self.listener()
            .map(|listener| lock(&listener.connections).len())
            .unwrap_or(0)
    }

    fn try_recv(&mut self) -> Option<Received> {
        self.inbound.as_mut()?.try_recv().ok()
    }
}

impl Drop for MemoryServerTransporter {
    fn drop(&mut self) {
        self.unbind();
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

struct Link {
    id: ConnectionId,
    listener: Arc<Listener>,
}

pub struct MemoryClientTransporter {
    network: MemoryNetwork,
    events_tx: UnboundedSender<ClientEvent>,
    events_rx: UnboundedReceiver<ClientEvent>,
    link: Option<Link>,
}

impl ClientTransporter for MemoryClientTransporter {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.disconnect();

        let listener = self
            .network
            .listener(port)
            .ok_or(TransportError::ConnectionRefused(port))?;
        let id = self.network.next_connection_id();
        lock(&listener.connections).insert(id, self.events_tx.clone());
        self.link = Some(Link { id, listener });

        let _ = self.events_tx.send(ClientEvent::Connected);
        tracing::debug!(%id, host, port, "memory client connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            lock(&link.listener.connections).remove(&link.id);
            let _ = self.events_tx.send(ClientEvent::Disconnected);
            tracing::debug!(id = %link.id, "memory client disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| lock(&link.listener.connections).contains_key(&link.id))
    }

    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let link = self
            .link
            .as_ref()
            .filter(|_| self.is_connected())
            .ok_or(TransportError::NotConnected)?;
        link.listener
            .inbound
            .send(Received {
                connection: link.id,
                data: data.to_vec(),
            })
            .map_err(|_| TransportError::ConnectionClosed(link.id.to_string()))
    }

    fn try_recv(&mut self) -> Option<ClientEvent> {
        let event = self.events_rx.try_recv().ok()?;
        if event == ClientEvent::Disconnected && !self.is_connected() {
            self.link = None;
        }
        Some(event)
    }
}
