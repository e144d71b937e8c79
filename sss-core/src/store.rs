//! Per-client page storage and lifecycle.
//!
//! ```text
//!                       PageStore
//!   ┌──────────────────────────────────────────────────┐
//!   │ template: Arc<PageTemplate>  (immutable, shared) │
//!   │ pages: RwLock<HashMap<ClientId, Arc<Mutex<..>>>> │
//!   │ transport: attached by start(), detached by stop │
//!   └──────────────────────────────────────────────────┘
//!        │ get(client)               │ send_to(client)
//!        ▼                           ▼
//!   ClientPage (clone)  ──►  Synchronizer::serialize ──► Transport
//! ```
//!
//! The map lock is only held for lookups and inserts. Serialization runs
//! under the page's own mutex, and nothing is sent while any store lock is
//! held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;

use crate::builder::PageTemplate;
use crate::element::{ClientElement, ElementKind, KindConfig};
use crate::id::ElementId;
use crate::page::{ClientId, ClientPage};
use crate::protocol::ProtocolError;
use crate::router::{InputEvent, InputRouter, RouteError, RouteOutcome};
use crate::sync::{Synchronizer, Transport};

/// Store behaviour knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Drop a client's page when it disconnects.
    pub purge_on_leave: bool,
    /// Push the page as soon as a client joins.
    pub send_on_join: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            purge_on_leave: true,
            send_on_join: true,
        }
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pages_created: u64,
    pub pages_sent: u64,
    pub inputs_routed: u64,
    pub inputs_rejected: u64,
    pub callbacks_fired: u64,
    pub active_pages: usize,
}

/// Lock-free counters, read through [`PageStore::stats`].
#[derive(Default)]
pub(crate) struct AtomicStoreStats {
    pages_created: AtomicU64,
    pages_sent: AtomicU64,
    inputs_routed: AtomicU64,
    inputs_rejected: AtomicU64,
    callbacks_fired: AtomicU64,
}

impl AtomicStoreStats {
    pub(crate) fn record_routed(&self, callback_fired: bool) {
        self.inputs_routed.fetch_add(1, Ordering::Relaxed);
        if callback_fired {
            self.callbacks_fired.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.inputs_rejected.fetch_add(1, Ordering::Relaxed);
    }
}

struct Attached {
    transport: Arc<dyn Transport>,
    generation: u64,
}

/// Map from client identity to that client's page.
pub struct PageStore {
    template: Arc<PageTemplate>,
    config: StoreConfig,
    pages: RwLock<HashMap<ClientId, Arc<Mutex<ClientPage>>>>,
    attached: RwLock<Option<Attached>>,
    generation: AtomicU64,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InputEvent>>>,
    disposed: AtomicBool,
    stats: AtomicStoreStats,
}

impl PageStore {
    /// Store with the default configuration.
    pub fn new(template: impl Into<Arc<PageTemplate>>) -> Self {
        Self::with_config(template, StoreConfig::default())
    }

    pub fn with_config(template: impl Into<Arc<PageTemplate>>, config: StoreConfig) -> Self {
        Self {
            template: template.into(),
            config,
            pages: RwLock::new(HashMap::new()),
            attached: RwLock::new(None),
            generation: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            stats: AtomicStoreStats::default(),
        }
    }

    pub fn template(&self) -> &Arc<PageTemplate> {
        &self.template
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ─── Pages ──────────────────────────────────────────────────────

    /// The page for `client`, cloned from the template on first access.
    ///
    /// Concurrent first calls for the same client all get the same page.
    /// Once the store is disposed the page is detached: it is built fresh
    /// and never stored.
    pub fn get(&self, client: ClientId) -> Arc<Mutex<ClientPage>> {
        if let Some(page) = read(&self.pages).get(&client) {
            return page.clone();
        }

        let mut pages = write(&self.pages);
        // Another caller may have won the race between the two locks.
        if let Some(page) = pages.get(&client) {
            return page.clone();
        }
        let page = Arc::new(Mutex::new(self.template.instantiate(client)));
        // Checked under the map lock, which dispose takes after setting the flag.
        if self.is_disposed() {
            log::warn!("Store disposed; handing {client} a detached page");
            return page;
        }
        pages.insert(client, page.clone());
        self.stats.pages_created.fetch_add(1, Ordering::Relaxed);
        log::info!("Created page for {client} ({} elements)", self.template.len());
        page
    }

    /// The page for `client` if one exists, without creating it.
    pub fn peek(&self, client: ClientId) -> Option<Arc<Mutex<ClientPage>>> {
        read(&self.pages).get(&client).cloned()
    }

    /// Drop the page for `client`. Returns whether one existed.
    pub fn remove(&self, client: ClientId) -> bool {
        let removed = write(&self.pages).remove(&client).is_some();
        if removed {
            log::debug!("Removed page for {client}");
        }
        removed
    }

    pub fn contains(&self, client: ClientId) -> bool {
        read(&self.pages).contains_key(&client)
    }

    pub fn len(&self) -> usize {
        read(&self.pages).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.pages).is_empty()
    }

    pub fn clients(&self) -> Vec<ClientId> {
        read(&self.pages).keys().copied().collect()
    }

    /// Cheap pre-check for inbound responses: does the page shape contain
    /// an element with this id and kind? Never creates a page.
    pub fn is_known_element(&self, client: ClientId, id: ElementId, kind: ElementKind) -> bool {
        match self.peek(client) {
            Some(page) => lock(&page).contains(id, kind),
            None => self.template.contains(id, kind),
        }
    }

    // ─── Sending ────────────────────────────────────────────────────

    /// Serialize and push the page of `client`. Returns whether the
    /// transport accepted it.
    pub fn send_to(&self, client: ClientId) -> bool {
        if self.is_disposed() {
            log::warn!("Ignoring send to {client}: store disposed");
            return false;
        }
        let page = self.get(client);
        self.send_page(client, &page)
    }

    /// Push every stored page. Returns how many were accepted.
    pub fn send_all(&self) -> usize {
        if self.is_disposed() {
            log::warn!("Ignoring send_all: store disposed");
            return 0;
        }
        let pages: Vec<_> = read(&self.pages)
            .iter()
            .map(|(client, page)| (*client, page.clone()))
            .collect();

        let sent = pages
            .iter()
            .filter(|(client, page)| self.send_page(*client, page))
            .count();
        log::debug!("Sent {sent}/{} pages", pages.len());
        sent
    }

    fn send_page(&self, client: ClientId, page: &Mutex<ClientPage>) -> bool {
        let bytes = {
            let page = lock(page);
            match Synchronizer::serialize(&page) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("Failed to serialize page for {client}: {e}");
                    return false;
                }
            }
        };
        let len = bytes.len();
        let transport = self.transport();
        let sent = Synchronizer::send(transport.as_deref(), client, bytes);
        if sent {
            self.stats.pages_sent.fetch_add(1, Ordering::Relaxed);
            log::debug!("Sent page to {client} ({len} bytes)");
        }
        sent
    }

    /// Replace the content of a text area on the page of `client` and push
    /// the new content.
    pub fn update_text_area(
        &self,
        client: ClientId,
        id: ElementId,
        content: impl Into<String>,
    ) -> Result<(), RouteError> {
        let content = content.into();
        self.mutate_and_send(client, id, ElementKind::TextArea, |element| {
            element.set_label(content.clone());
            Synchronizer::text_area_update(id, &content)
        })
    }

    /// Empty a plain text field on the page of `client` and ask the client
    /// to do the same.
    pub fn clear_plain_text(&self, client: ClientId, id: ElementId) -> Result<(), RouteError> {
        self.mutate_and_send(client, id, ElementKind::PlainText, |element| {
            element.clear_text();
            Synchronizer::plain_text_clear(id)
        })
    }

    /// Empty a plain text field for every stored client matching
    /// `predicate`. Returns how many fields were cleared.
    pub fn clear_plain_text_where<P>(&self, id: ElementId, mut predicate: P) -> usize
    where
        P: FnMut(ClientId) -> bool,
    {
        let cleared = self
            .clients()
            .into_iter()
            .filter(|client| predicate(*client))
            .filter(|client| self.clear_plain_text(*client, id).is_ok())
            .count();
        log::debug!("Cleared plain text {id} for {cleared} clients");
        cleared
    }

    /// Run `update` on one element of the page of `client`, then push the
    /// whole page again. Only this client's copy changes.
    pub fn update_element<F, R>(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        update: F,
    ) -> Result<R, RouteError>
    where
        F: FnOnce(&mut ClientElement) -> R,
    {
        let (page, result) = self.with_element(client, id, kind, update)?;
        self.send_page(client, &page);
        Ok(result)
    }

    /// Replace the kind configuration of one element for `client` only and
    /// push the page again. A rejected configuration changes and sends
    /// nothing.
    pub fn reconfigure<F>(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        configure: F,
    ) -> Result<(), RouteError>
    where
        F: FnOnce(&mut KindConfig),
    {
        let (page, result) =
            self.with_element(client, id, kind, |element| element.reconfigure(configure))?;
        result?;
        self.send_page(client, &page);
        Ok(())
    }

    fn with_element<F, R>(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        f: F,
    ) -> Result<(Arc<Mutex<ClientPage>>, R), RouteError>
    where
        F: FnOnce(&mut ClientElement) -> R,
    {
        if self.is_disposed() {
            return Err(RouteError::Disposed);
        }
        let page = self.get(client);
        let result = {
            let mut guard = lock(&page);
            let element = guard
                .find_mut(id, kind)
                .ok_or(RouteError::UnknownElement { client, id, kind })?;
            f(element)
        };
        Ok((page, result))
    }

    fn mutate_and_send<F>(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        mutate: F,
    ) -> Result<(), RouteError>
    where
        F: FnOnce(&mut ClientElement) -> Result<Vec<u8>, ProtocolError>,
    {
        let (_, encoded) = self.with_element(client, id, kind, mutate)?;

        match encoded {
            Ok(bytes) => {
                let transport = self.transport();
                Synchronizer::send(transport.as_deref(), client, bytes);
            }
            // The local clone is already updated; the next full send carries it.
            Err(e) => log::error!("Failed to encode {kind} {id} update for {client}: {e}"),
        }
        Ok(())
    }

    // ─── Input ──────────────────────────────────────────────────────

    /// Route one inbound response to the element it answers.
    pub fn route_input(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        payload: &[u8],
    ) -> Result<RouteOutcome, RouteError> {
        InputRouter::new(self).route(client, id, kind, payload)
    }

    /// Receive an [`InputEvent`] for every qualifying input from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<InputEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: InputEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn check_routable(&self, client: ClientId) -> Result<(), RouteError> {
        if self.is_disposed() {
            return Err(RouteError::Disposed);
        }
        match self.transport() {
            Some(transport) if !transport.is_connected(client) => {
                Err(RouteError::Disconnected(client))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn stats_handle(&self) -> &AtomicStoreStats {
        &self.stats
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Attach `transport`. The returned guard detaches it when dropped.
    ///
    /// Starting again replaces the previous transport; the older guard then
    /// no longer detaches anything.
    pub fn start(&self, transport: Arc<dyn Transport>) -> Subscription<'_> {
        if self.is_disposed() {
            log::warn!("Ignoring start: store disposed");
            return Subscription {
                store: self,
                generation: 0,
            };
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let replaced = write(&self.attached)
            .replace(Attached {
                transport,
                generation,
            })
            .is_some();
        if replaced {
            log::info!("Page store transport replaced");
        } else {
            log::info!("Page store started");
        }
        Subscription {
            store: self,
            generation,
        }
    }

    /// Detach the current transport, if any.
    pub fn stop(&self) {
        if write(&self.attached).take().is_some() {
            log::info!("Page store stopped");
        }
    }

    fn detach(&self, generation: u64) {
        let mut attached = write(&self.attached);
        if attached.as_ref().is_some_and(|a| a.generation == generation) {
            *attached = None;
            log::info!("Page store stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        read(&self.attached).is_some()
    }

    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        read(&self.attached).as_ref().map(|a| a.transport.clone())
    }

    /// A client connected: create its page and push it if configured to.
    pub fn on_client_joined(&self, client: ClientId) {
        if self.is_disposed() {
            return;
        }
        log::info!("Client {client} joined");
        if self.config.send_on_join {
            self.send_to(client);
        } else {
            self.get(client);
        }
    }

    /// A client disconnected: purge its page if configured to.
    pub fn on_client_left(&self, client: ClientId) {
        log::info!("Client {client} left");
        if self.config.purge_on_leave {
            self.remove(client);
        }
    }

    /// Drop every page, detach the transport and refuse further input.
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = {
            let mut pages = write(&self.pages);
            let n = pages.len();
            pages.clear();
            n
        };
        write(&self.attached).take();
        lock(&self.subscribers).clear();
        log::info!("Page store disposed ({dropped} pages dropped)");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            pages_created: self.stats.pages_created.load(Ordering::Relaxed),
            pages_sent: self.stats.pages_sent.load(Ordering::Relaxed),
            inputs_routed: self.stats.inputs_routed.load(Ordering::Relaxed),
            inputs_rejected: self.stats.inputs_rejected.load(Ordering::Relaxed),
            callbacks_fired: self.stats.callbacks_fired.load(Ordering::Relaxed),
            active_pages: self.len(),
        }
    }
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("template", &self.template.len())
            .field("config", &self.config)
            .field("pages", &self.len())
            .field("started", &self.is_started())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Keeps a transport attached to a [`PageStore`]; detaches on drop.
#[must_use = "dropping the subscription detaches the transport"]
pub struct Subscription<'a> {
    store: &'a PageStore,
    generation: u64,
}

impl Subscription<'_> {
    /// Whether this guard's transport is still the attached one.
    pub fn is_active(&self) -> bool {
        read(&self.store.attached)
            .as_ref()
            .is_some_and(|a| a.generation == self.generation)
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.store.detach(self.generation);
    }
}

// Callbacks never run under these locks, so a poisoned lock still guards
// consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
