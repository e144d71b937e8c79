//! Outbound page synchronization.
//!
//! The core never owns a socket. Everything it sends goes through a
//! [`Transport`], which only has to hand bytes to a client without blocking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::id::ElementId;
use crate::page::{ClientId, ClientPage};
use crate::protocol::{EntriesPack, EntryWire, ProtocolError, ServerMessage, PROTOCOL_VERSION};
use crate::store::lock;

/// Transport failures. Sends are fire-and-forget, so these are only logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Client {0} is not connected")]
    NotConnected(ClientId),
    #[error("Outbound queue for client {0} is full")]
    QueueFull(ClientId),
    #[error("Outbound queue for client {0} is closed")]
    Closed(ClientId),
}

/// Delivery seam between the store and whatever carries bytes to clients.
pub trait Transport: Send + Sync {
    /// Queue `bytes` for `client`. Must not block.
    fn send_bytes(&self, client: ClientId, bytes: Arc<Vec<u8>>) -> Result<(), TransportError>;

    fn is_connected(&self, _client: ClientId) -> bool {
        true
    }
}

/// Page and update serialization.
pub struct Synchronizer;

impl Synchronizer {
    /// Wire entries for `page`, in page order.
    pub fn entries(page: &ClientPage) -> EntriesPack {
        EntriesPack {
            version: PROTOCOL_VERSION,
            entries: page.elements().iter().map(EntryWire::from_element).collect(),
        }
    }

    /// Encode the full page as a `ServerMessage::Entries`.
    pub fn serialize(page: &ClientPage) -> Result<Vec<u8>, ProtocolError> {
        ServerMessage::Entries(Self::entries(page)).encode()
    }

    pub fn text_area_update(id: ElementId, content: &str) -> Result<Vec<u8>, ProtocolError> {
        ServerMessage::TextAreaUpdate {
            id,
            content: content.to_string(),
        }
        .encode()
    }

    pub fn plain_text_clear(id: ElementId) -> Result<Vec<u8>, ProtocolError> {
        ServerMessage::PlainTextClear { id }.encode()
    }

    /// Hand `bytes` to the transport. Returns whether it was accepted.
    pub fn send(transport: Option<&dyn Transport>, client: ClientId, bytes: Vec<u8>) -> bool {
        let Some(transport) = transport else {
            log::warn!("No transport attached; dropping {} bytes for {client}", bytes.len());
            return false;
        };
        match transport.send_bytes(client, Arc::new(bytes)) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send to {client}: {e}");
                false
            }
        }
    }
}

/// In-memory transport that records every send. Handy for tests and tools
/// that drive a store without a network.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<(ClientId, Arc<Vec<u8>>)>>,
    disconnected: Mutex<HashSet<ClientId>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything sent so far.
    pub fn take(&self) -> Vec<(ClientId, Arc<Vec<u8>>)> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Decoded messages sent to `client`, oldest first.
    pub fn messages_for(&self, client: ClientId) -> Vec<ServerMessage> {
        lock(&self.sent)
            .iter()
            .filter(|(c, _)| *c == client)
            .filter_map(|(_, bytes)| ServerMessage::decode(bytes).ok())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn disconnect(&self, client: ClientId) {
        lock(&self.disconnected).insert(client);
    }

    pub fn reconnect(&self, client: ClientId) {
        lock(&self.disconnected).remove(&client);
    }
}

impl Transport for MemoryTransport {
    fn send_bytes(&self, client: ClientId, bytes: Arc<Vec<u8>>) -> Result<(), TransportError> {
        if !self.is_connected(client) {
            return Err(TransportError::NotConnected(client));
        }
        lock(&self.sent).push((client, bytes));
        Ok(())
    }

    fn is_connected(&self, client: ClientId) -> bool {
        !lock(&self.disconnected).contains(&client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Button, GroupHeader, PageBuilder, PlainText, Slider};
    use crate::element::ElementKind;
    use crate::protocol::EntryFields;
    use uuid::Uuid;

    fn page() -> ClientPage {
        PageBuilder::new()
            .add_group_header(GroupHeader::new("Settings"))
            .add_button(Button::new("Test", "Click").hint("A button"))
            .add_slider(Slider::new("Volume", 0.0, 10.0).default_value(5.0))
            .add_plain_text(PlainText::new("Name"))
            .build()
            .unwrap()
            .instantiate(Uuid::new_v4())
    }

    #[test]
    fn test_entries_follow_page_order() {
        let pack = Synchronizer::entries(&page());

        assert_eq!(pack.version, PROTOCOL_VERSION);
        let ids: Vec<_> = pack.entries.iter().map(|e| (e.id, e.kind)).collect();
        assert_eq!(
            ids,
            vec![
                (1, ElementKind::GroupHeader),
                (2, ElementKind::Button),
                (3, ElementKind::Slider),
                (4, ElementKind::PlainText),
            ]
        );
        assert_eq!(pack.entries[1].hint.as_deref(), Some("A button"));
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let page = page();
        let a = Synchronizer::serialize(&page).unwrap();
        let b = Synchronizer::serialize(&page).unwrap();
        assert_eq!(a, b);

        let pack = ServerMessage::decode(&a).unwrap().into_entries().unwrap();
        match &pack.entries[2].fields {
            EntryFields::Slider { value, .. } => assert_eq!(*value, 5.0),
            other => panic!("Expected slider fields, got {other:?}"),
        }
    }

    #[test]
    fn test_send_without_transport_drops() {
        assert!(!Synchronizer::send(None, Uuid::new_v4(), vec![1, 2, 3]));
    }

    #[test]
    fn test_memory_transport_records_and_disconnects() {
        let transport = MemoryTransport::new();
        let client = Uuid::new_v4();
        let bytes = Synchronizer::plain_text_clear(4).unwrap();

        assert!(Synchronizer::send(Some(&transport), client, bytes.clone()));
        assert_eq!(
            transport.messages_for(client),
            vec![ServerMessage::PlainTextClear { id: 4 }]
        );

        transport.disconnect(client);
        assert!(!transport.is_connected(client));
        assert!(!Synchronizer::send(Some(&transport), client, bytes));
        assert_eq!(transport.take().len(), 1);
        assert_eq!(transport.sent_count(), 0);
    }
}
