//! Per-connection outbound queues.
//!
//! Each WebSocket connection registers a bounded channel; the page store
//! pushes encoded messages into it through the [`Transport`] trait and the
//! connection task drains it onto the socket. Sending never blocks: a full
//! queue drops the message and counts it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use sss_core::{ClientId, Transport, TransportError};

/// Registry of connected clients and their outbound queues.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ClientId, mpsc::Sender<Arc<Vec<u8>>>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl SessionRegistry {
    /// `capacity` bounds how many messages may wait per client.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register `client`, returning the receiver its connection drains.
    /// Re-registering replaces (and closes) the previous queue.
    pub fn register(&self, client: ClientId) -> mpsc::Receiver<Arc<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client, tx);
        rx
    }

    pub fn unregister(&self, client: ClientId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&client)
            .is_some()
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&client)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages dropped because a queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn sender(&self, client: ClientId) -> Option<mpsc::Sender<Arc<Vec<u8>>>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&client)
            .cloned()
    }
}

impl Transport for SessionRegistry {
    fn send_bytes(&self, client: ClientId, bytes: Arc<Vec<u8>>) -> Result<(), TransportError> {
        let sender = self
            .sender(client)
            .ok_or(TransportError::NotConnected(client))?;
        sender.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                TransportError::QueueFull(client)
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(client),
        })
    }

    fn is_connected(&self, client: ClientId) -> bool {
        self.sender(client).is_some_and(|tx| !tx.is_closed())
    }
}
