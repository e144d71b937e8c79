//! Inbound input routing: correlation, change detection and dispatch.
//!
//! ```text
//! (client, id, kind, payload)
//!       │
//!       ▼
//! PageStore::get(client) ── disposed / disconnected → RouteError
//!       │
//!       ▼
//! find element (id AND kind) ── miss → RouteError::UnknownElement
//!       │
//!       ▼  (page lock held)
//! decode payload into current value, compare with previous, previous := current
//!       │
//!       ▼  (page lock released, element snapshot)
//! page listener (always) → element handler (if qualifying) → InputEvent subscribers
//! ```
//!
//! Every rejection is logged and returned; none of them panic or touch any
//! other client's page.

use std::collections::HashMap;
use std::sync::Arc;

use crate::element::{ClientElement, ElementKind, InputValue};
use crate::id::ElementId;
use crate::page::ClientId;
use crate::store::{lock, PageStore};

/// Context handed to listeners and element callbacks.
pub struct InputContext<'a> {
    pub client: ClientId,
    /// Snapshot of the element right after the input was applied.
    pub element: &'a ClientElement,
    pub value: &'a InputValue,
    /// Whether the element callback qualifies for this input: always for
    /// buttons and keybinds, only on change for stateful kinds, never for
    /// headers and text areas.
    pub dispatch: bool,
    /// The store that routed the input, for follow-up sends and updates.
    pub store: &'a PageStore,
}

/// Type-erased callback.
pub type Handler = Arc<dyn Fn(&InputContext<'_>) + Send + Sync>;

/// Callbacks keyed by element id, plus the page-level listener.
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<ElementId, Handler>,
    listener: Option<Handler>,
}

impl HandlerTable {
    /// Register (or replace) the callback for `id`.
    pub fn insert(&mut self, id: ElementId, handler: Handler) {
        self.handlers.insert(id, handler);
    }

    pub fn set_listener(&mut self, listener: Handler) {
        self.listener = Some(listener);
    }

    pub fn get(&self, id: ElementId) -> Option<&Handler> {
        self.handlers.get(&id)
    }

    pub fn listener(&self) -> Option<&Handler> {
        self.listener.as_ref()
    }

    /// Number of element callbacks (the listener is not counted).
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn element_ids(&self) -> Vec<ElementId> {
        self.handlers.keys().copied().collect()
    }
}

/// Emitted to [`PageStore::subscribe`] receivers for every qualifying input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub client: ClientId,
    pub element_id: ElementId,
    pub kind: ElementKind,
    pub value: InputValue,
}

/// What happened to a successfully routed input.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub element_id: ElementId,
    pub kind: ElementKind,
    pub value: InputValue,
    /// The input qualified for element dispatch.
    pub dispatched: bool,
    /// An element callback was registered and invoked.
    pub callback_fired: bool,
}

/// Per-event routing failures. All are recovered locally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("Store has been disposed")]
    Disposed,
    #[error("Client {0} is not connected")]
    Disconnected(ClientId),
    #[error("No {kind} element {id} on the page of client {client}")]
    UnknownElement {
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
    },
    #[error("Malformed input for element {id}: {reason}")]
    MalformedEntry { id: ElementId, reason: String },
    #[error("Failed to decode {kind} payload for element {id}: {reason}")]
    Decode {
        id: ElementId,
        kind: ElementKind,
        reason: String,
    },
    #[error("Element {id} state does not match its {expected} configuration")]
    KindMismatch { id: ElementId, expected: ElementKind },
    #[error("Rejected reconfiguration: {0}")]
    InvalidConfig(#[from] crate::builder::BuildError),
}

/// Routes inbound inputs against one store's pages.
pub struct InputRouter<'a> {
    store: &'a PageStore,
}

impl<'a> InputRouter<'a> {
    pub fn new(store: &'a PageStore) -> Self {
        Self { store }
    }

    /// Route one input. Failures are logged here; callers may ignore the error.
    pub fn route(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        payload: &[u8],
    ) -> Result<RouteOutcome, RouteError> {
        let result = self.route_inner(client, id, kind, payload);
        match &result {
            Ok(outcome) => {
                self.store.stats_handle().record_routed(outcome.callback_fired);
                log::trace!(
                    "Routed {kind} {id} for {client} (dispatched: {})",
                    outcome.dispatched
                );
            }
            Err(e) => {
                self.store.stats_handle().record_rejected();
                log::warn!("Dropped input from {client}: {e}");
            }
        }
        result
    }

    fn route_inner(
        &self,
        client: ClientId,
        id: ElementId,
        kind: ElementKind,
        payload: &[u8],
    ) -> Result<RouteOutcome, RouteError> {
        self.store.check_routable(client)?;
        let page = self.store.get(client);

        // Mutate under the page lock, dispatch on a snapshot after releasing it.
        let (snapshot, applied) = {
            let mut page = lock(&page);
            let element = page
                .find_mut(id, kind)
                .ok_or(RouteError::UnknownElement { client, id, kind })?;
            let applied = element.apply_input(payload)?;
            (element.clone(), applied)
        };

        let handlers = self.store.template().handlers();
        let ctx = InputContext {
            client,
            element: &snapshot,
            value: &applied.value,
            dispatch: applied.fire,
            store: self.store,
        };

        if let Some(listener) = handlers.listener() {
            listener(&ctx);
        }

        let mut callback_fired = false;
        if applied.fire {
            if let Some(handler) = handlers.get(id) {
                handler(&ctx);
                callback_fired = true;
            }
            self.store.emit(InputEvent {
                client,
                element_id: id,
                kind,
                value: applied.value.clone(),
            });
        }

        Ok(RouteOutcome {
            element_id: id,
            kind,
            value: applied.value,
            dispatched: applied.fire,
            callback_fired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Button, Dropdown, GroupHeader, Keybind, PageBuilder, TwoButtons};
    use crate::protocol::{encode_payload, DropdownPayload, KeybindPayload, TwoButtonsPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[test]
    fn test_listener_runs_before_element_handler() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());

        let template = PageBuilder::new()
            .add_button(Button::new("Go", "Go").on_interact(move |_| {
                o1.lock().unwrap().push("element");
            }))
            .on_user_input(move |_| o2.lock().unwrap().push("page"))
            .build()
            .unwrap();
        let store = PageStore::new(template);

        store.route_input(Uuid::new_v4(), 1, ElementKind::Button, &[]).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["page", "element"]);
    }

    #[test]
    fn test_listener_fires_even_without_change() {
        let seen = Arc::new(AtomicUsize::new(0));
        let changed = Arc::new(AtomicUsize::new(0));
        let (s, c) = (seen.clone(), changed.clone());

        let template = PageBuilder::new()
            .add_two_buttons(TwoButtons::new("Side", "A", "B").on_changed(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .on_user_input(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let store = PageStore::new(template);
        let client = Uuid::new_v4();
        let payload = encode_payload(&TwoButtonsPayload { is_b: true }).unwrap();

        for _ in 0..3 {
            store.route_input(client, 1, ElementKind::TwoButtons, &payload).unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(changed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keybind_fires_every_event() {
        let presses = Arc::new(Mutex::new(Vec::new()));
        let p = presses.clone();
        let template = PageBuilder::new()
            .add_keybind(Keybind::new("Ping").on_input(move |_, pressed| {
                p.lock().unwrap().push(pressed);
            }))
            .build()
            .unwrap();
        let store = PageStore::new(template);
        let client = Uuid::new_v4();
        let down = encode_payload(&KeybindPayload { pressed: true }).unwrap();

        store.route_input(client, 1, ElementKind::Keybind, &down).unwrap();
        store.route_input(client, 1, ElementKind::Keybind, &down).unwrap();
        assert_eq!(*presses.lock().unwrap(), vec![true, true]);
    }

    #[test]
    fn test_group_header_never_dispatches() {
        let template = PageBuilder::new()
            .add_group_header(GroupHeader::new("Header"))
            .build()
            .unwrap();
        let store = PageStore::new(template);

        let outcome = store
            .route_input(Uuid::new_v4(), 1, ElementKind::GroupHeader, &[])
            .unwrap();
        assert!(!outcome.dispatched);
        assert!(!outcome.callback_fired);
        assert_eq!(outcome.value, InputValue::None);
    }

    #[test]
    fn test_kind_mismatch_is_unknown_element() {
        let template = PageBuilder::new()
            .add_button(Button::new("Go", "Go"))
            .build()
            .unwrap();
        let store = PageStore::new(template);
        let client = Uuid::new_v4();

        let err = store
            .route_input(client, 1, ElementKind::Slider, &[1, 2, 3])
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::UnknownElement { client, id: 1, kind: ElementKind::Slider }
        );
    }

    #[test]
    fn test_decode_failure_leaves_value_and_dispatch_state() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let template = PageBuilder::new()
            .add_dropdown(Dropdown::new("Mode", ["A", "B", "C"]).on_changed(move |_, _| {
                f.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();
        let store = PageStore::new(template);
        let client = Uuid::new_v4();

        assert!(matches!(
            store.route_input(client, 1, ElementKind::Dropdown, &[]),
            Err(RouteError::MalformedEntry { id: 1, .. })
        ));
        let page = store.get(client);
        assert_eq!(lock(&page).element(1).unwrap().selected_index(), Some(0));

        let payload = encode_payload(&DropdownPayload { index: 2 }).unwrap();
        store.route_input(client, 1, ElementKind::Dropdown, &payload).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().inputs_rejected, 1);
        assert_eq!(store.stats().inputs_routed, 1);
    }

    #[test]
    fn test_handler_can_reenter_store() {
        let template = PageBuilder::new()
            .add_button(Button::new("Refresh", "Go").on_interact(|ctx| {
                // Page lock is released before dispatch.
                let page = ctx.store.get(ctx.client);
                assert_eq!(lock(&page).len(), 1);
                ctx.store.send_to(ctx.client);
            }))
            .build()
            .unwrap();
        let store = PageStore::new(template);

        let outcome = store
            .route_input(Uuid::new_v4(), 1, ElementKind::Button, &[])
            .unwrap();
        assert!(outcome.callback_fired);
    }
}
