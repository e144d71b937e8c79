//! WebSocket server that hosts one settings page for every connection.
//!
//! Architecture:
//! ```text
//! Client A ──┐                       ┌── ClientPage (A)
//!            ├── SettingsServer ── PageStore
//! Client B ──┘        │              └── ClientPage (B)
//!                     │
//!              SessionRegistry (outbound queue per client)
//! ```
//!
//! Each connection gets a fresh identity. Its messages are handled in order
//! by one task, which also drains the connection's outbound queue onto the
//! socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use sss_core::protocol::{ClientMessage, ServerMessage};
use sss_core::{ClientId, PageStore, ProtocolError, Synchronizer, Transport};

use crate::transport::SessionRegistry;

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Messages buffered per client before sends are dropped
    pub outbound_capacity: usize,
    /// Connections beyond this are closed immediately
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            outbound_capacity: 64,
            max_clients: 256,
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub rejected_connections: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub decode_errors: u64,
    pub unknown_responses: u64,
}

#[derive(Default)]
struct AtomicServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    decode_errors: AtomicU64,
    unknown_responses: AtomicU64,
}

impl AtomicServerStats {
    fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_responses: self.unknown_responses.load(Ordering::Relaxed),
        }
    }
}

/// A reserved connection slot, released on drop.
///
/// Slots are taken at accept time, before the handshake, so simultaneous
/// connects cannot overshoot `max_clients`.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn try_acquire(slots: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(slots.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The settings server.
pub struct SettingsServer {
    config: ServerConfig,
    store: Arc<PageStore>,
    sessions: Arc<SessionRegistry>,
    stats: Arc<AtomicServerStats>,
    slots: Arc<AtomicUsize>,
}

impl SettingsServer {
    pub fn new(store: Arc<PageStore>, config: ServerConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.outbound_capacity));
        Self {
            config,
            store,
            sessions,
            stats: Arc::new(AtomicServerStats::default()),
            slots: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_defaults(store: Arc<PageStore>) -> Self {
        Self::new(store, ServerConfig::default())
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    ///
    /// The store's transport is attached for as long as this future lives.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let _subscription = self.store.start(self.sessions.clone());
        log::info!("Settings server listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;

            let Some(slot) = ConnectionSlot::try_acquire(&self.slots, self.config.max_clients)
            else {
                self.stats.rejected_connections.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Rejecting connection from {addr}: {} clients connected",
                    self.config.max_clients
                );
                drop(stream);
                continue;
            };
            log::debug!("New TCP connection from {addr}");

            let store = self.store.clone();
            let sessions = self.sessions.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                let _slot = slot;
                let result = Self::handle_connection(stream, addr, store, sessions, stats).await;
                if let Err(e) = result {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        store: Arc<PageStore>,
        sessions: Arc<SessionRegistry>,
        stats: Arc<AtomicServerStats>,
    ) -> Result<(), ServerError> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let client: ClientId = Uuid::new_v4();
        let mut outbound = sessions.register(client);
        stats.total_connections.fetch_add(1, Ordering::Relaxed);
        stats.active_connections.fetch_add(1, Ordering::Relaxed);
        log::info!("Client {client} connected from {addr}");

        store.on_client_joined(client);

        let result = async {
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Binary(data))) => {
                                stats.messages_received.fetch_add(1, Ordering::Relaxed);
                                stats
                                    .bytes_received
                                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                                Self::handle_message(&store, &sessions, &stats, client, &data);
                            }
                            Some(Ok(Message::Ping(data))) => {
                                ws_sender.send(Message::Pong(data)).await?;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                log::info!("Connection closed from {addr}");
                                break;
                            }
                            Some(Err(e)) => {
                                log::error!("WebSocket error from {addr}: {e}");
                                break;
                            }
                            _ => {}
                        }
                    }

                    bytes = outbound.recv() => {
                        match bytes {
                            Some(bytes) => {
                                stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                                stats.bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                                ws_sender.send(Message::Binary(bytes.to_vec().into())).await?;
                            }
                            // Session replaced or registry dropped.
                            None => break,
                        }
                    }
                }
            }
            Ok::<(), ServerError>(())
        }
        .await;

        sessions.unregister(client);
        store.on_client_left(client);
        stats.active_connections.fetch_sub(1, Ordering::Relaxed);
        log::info!("Client {client} disconnected");

        result
    }

    fn handle_message(
        store: &PageStore,
        sessions: &SessionRegistry,
        stats: &AtomicServerStats,
        client: ClientId,
        data: &[u8],
    ) {
        let msg = match ClientMessage::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to decode message from {client}: {e}");
                return;
            }
        };

        match msg {
            ClientMessage::FetchPage => {
                store.send_to(client);
            }
            ClientMessage::Response(response) => {
                if !store.is_known_element(client, response.id, response.kind) {
                    stats.unknown_responses.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "Client {client} answered unknown {} element {}",
                        response.kind,
                        response.id
                    );
                    return;
                }
                // Rejections are logged by the router.
                let _ = store.route_input(client, response.id, response.kind, &response.payload);
            }
            ClientMessage::Ping => match ServerMessage::Pong.encode() {
                Ok(bytes) => {
                    Synchronizer::send(Some(sessions as &dyn Transport), client, bytes);
                }
                Err(e) => log::error!("Failed to encode pong: {e}"),
            },
        }
    }

    pub fn stats(&self) -> ServerStats {
        self.stats.snapshot()
    }

    /// Connections currently holding a slot, including those still in the
    /// handshake.
    pub fn connection_count(&self) -> usize {
        self.slots.load(Ordering::Acquire)
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}
