//! WebSocket transporters using `tokio-tungstenite`.
//!
//! Socket I/O runs as tasks on a tokio runtime handle. Each connection gets
//! a reader task that pushes whole binary messages into an inbound channel
//! and a writer task fed by an outbound channel, so the synchronous
//! transporter methods only ever touch channels.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message;

use crate::{
    lock, ClientEvent, ClientTransporter, ConnectionId, Received, ServerTransporter,
    TransportError,
};

/// Pause after a failed accept. Errors such as fd exhaustion repeat
/// immediately, so retrying at once would spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Turns one WebSocket message into protocol bytes. Control frames yield
/// `None`.
fn message_data(message: Message) -> Option<Vec<u8>> {
    match message {
        Message::Binary(data) => Some(data.into()),
        Message::Text(text) => Some(text.as_bytes().to_vec()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

struct Peer {
    outbound: UnboundedSender<Vec<u8>>,
    reader: AbortHandle,
}

type Peers = Arc<Mutex<BTreeMap<ConnectionId, Peer>>>;

/// A WebSocket [`ServerTransporter`].
pub struct WebSocketServerTransporter {
    runtime: Handle,
    host: String,
    peers: Peers,
    inbound_tx: UnboundedSender<Received>,
    inbound_rx: UnboundedReceiver<Received>,
    listener: Option<(SocketAddr, JoinHandle<()>)>,
}

impl WebSocketServerTransporter {
    /// Creates an unbound transporter whose I/O runs on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            host: "0.0.0.0".to_string(),
            peers: Arc::new(Mutex::new(BTreeMap::new())),
            inbound_tx,
            inbound_rx,
            listener: None,
        }
    }

    /// Creates a transporter on the runtime of the calling task.
    pub fn from_current() -> Result<Self, TransportError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Sets the interface to listen on. Defaults to all interfaces.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|(addr, _)| *addr)
    }
}

impl ServerTransporter for WebSocketServerTransporter {
    fn bind(&mut self, port: u16) -> Result<(), TransportError> {
        self.unbind();

        let bind_failed = |source| TransportError::BindFailed { port, source };
        let std_listener =
            std::net::TcpListener::bind((self.host.as_str(), port)).map_err(bind_failed)?;
        std_listener.set_nonblocking(true).map_err(bind_failed)?;
        let addr = std_listener.local_addr().map_err(bind_failed)?;

        let listener = {
            let _guard = self.runtime.enter();
            tokio::net::TcpListener::from_std(std_listener).map_err(bind_failed)?
        };

        let accept = self.runtime.spawn(accept_loop(
            listener,
            Arc::clone(&self.peers),
            self.inbound_tx.clone(),
        ));
        self.listener = Some((addr, accept));
        tracing::info!(%addr, "WebSocket transporter listening");
        Ok(())
    }

    fn unbind(&mut self) {
        let Some((addr, accept)) = self.listener.take() else {
            return;
        };
        accept.abort();
        // Dropping the outbound senders lets each writer send a close frame.
        let peers = std::mem::take(&mut *lock(&self.peers));
        for peer in peers.values() {
            peer.reader.abort();
        }
        tracing::info!(%addr, closed = peers.len(), "WebSocket transporter unbound");
    }

    fn send_to_one(&self, data: &[u8], connection: ConnectionId) -> Result<(), TransportError> {
        let peers = lock(&self.peers);
        let peer = peers
            .get(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        peer.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed(connection.to_string()))
    }

    fn send_to_all(&self, data: &[u8], exclude: Option<ConnectionId>) {
        for (id, peer) in lock(&self.peers).iter() {
            if Some(*id) == exclude {
                continue;
            }
            if peer.outbound.send(data.to_vec()).is_err() {
                tracing::debug!(%id, "dropping message for closed connection");
            }
        }
    }

    fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }

    fn try_recv(&mut self) -> Option<Received> {
        self.inbound_rx.try_recv().ok()
    }
}

impl Drop for WebSocketServerTransporter {
    fn drop(&mut self) {
        self.unbind();
    }
}

async fn accept_loop(
    listener: tokio::net::TcpListener,
    peers: Peers,
    inbound: UnboundedSender<Received>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let peers = Arc::clone(&peers);
        let inbound = inbound.clone();
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "WebSocket handshake failed");
                    return;
                }
            };
            let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            let (mut sink, mut stream) = ws.split();
            let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

            tokio::spawn(async move {
                while let Some(data) = outbound_rx.recv().await {
                    if sink.send(Message::Binary(data.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            // Register before the reader can run so its cleanup always
            // finds the entry.
            let mut registered = lock(&peers);
            let reader_peers = Arc::clone(&peers);
            let reader = tokio::spawn(async move {
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Close(_)) => break,
                        Ok(message) => {
                            if let Some(data) = message_data(message) {
                                let _ = inbound.send(Received {
                                    connection: id,
                                    data,
                                });
                            }
                        }
                        Err(e) => {
                            tracing::debug!(%id, error = %e, "WebSocket read failed");
                            break;
                        }
                    }
                }
                lock(&reader_peers).remove(&id);
                tracing::debug!(%id, "connection closed");
            });

            registered.insert(
                id,
                Peer {
                    outbound: outbound_tx,
                    reader: reader.abort_handle(),
                },
            );
            drop(registered);
            tracing::debug!(%id, %addr, "accepted WebSocket connection");
        });
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A WebSocket [`ClientTransporter`].
pub struct WebSocketClientTransporter {
    runtime: Handle,
    connected: Arc<AtomicBool>,
    events_tx: UnboundedSender<ClientEvent>,
    events_rx: UnboundedReceiver<ClientEvent>,
    outbound: Option<UnboundedSender<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketClientTransporter {
    pub fn new(runtime: Handle) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            connected: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            outbound: None,
            task: None,
        }
    }

    pub fn from_current() -> Result<Self, TransportError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl ClientTransporter for WebSocketClientTransporter {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.disconnect();

        let url = format!("ws://{host}:{port}");
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(run_client(
            url,
            outbound_rx,
            self.events_tx.clone(),
            Arc::clone(&self.connected),
        ));
        self.outbound = Some(outbound_tx);
        self.task = Some(task);
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        self.outbound = None;
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events_tx.send(ClientEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self
            .outbound
            .as_ref()
            .filter(|_| self.is_connected())
            .ok_or(TransportError::NotConnected)?;
        outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("writer stopped".to_string()))
    }

    fn try_recv(&mut self) -> Option<ClientEvent> {
        self.events_rx.try_recv().ok()
    }
}

impl Drop for WebSocketClientTransporter {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_client(
    url: String,
    mut outbound: UnboundedReceiver<Vec<u8>>,
    events: UnboundedSender<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            tracing::warn!(%url, error = %e, "WebSocket connect failed");
            let _ = events.send(ClientEvent::Disconnected);
            return;
        }
    };
    tracing::debug!(%url, "WebSocket connected");
    connected.store(true, Ordering::SeqCst);
    let _ = events.send(ClientEvent::Connected);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            data = outbound.recv() => {
                let Some(data) = data else { break };
                if let Err(e) = sink.send(Message::Binary(data.into())).await {
                    tracing::debug!(error = %e, "WebSocket send failed");
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(message)) => {
                    if let Some(data) = message_data(message) {
                        let _ = events.send(ClientEvent::Received(data));
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    let _ = sink.close().await;
    if connected.swap(false, Ordering::SeqCst) {
        let _ = events.send(ClientEvent::Disconnected);
    }
    tracing::debug!(%url, "WebSocket disconnected");
}
