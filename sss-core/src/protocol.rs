//! Binary wire protocol between the settings server and its clients.
//!
//! All messages are bincode-encoded (`config::standard()`). Decoding is
//! capped per message family so a forged length prefix fails instead of
//! allocating what it claims.
//!
//! ```text
//! server → client   ServerMessage::Entries(EntriesPack)
//!                     ├── version
//!                     └── [EntryWire { id, kind, label, hint, fields }]  (page order)
//!                   ServerMessage::TextAreaUpdate { id, content }
//!                   ServerMessage::PlainTextClear { id }
//!
//! client → server   ClientMessage::FetchPage
//!                   ClientMessage::Response(ClientResponse { id, kind, payload })
//!                                                                  │
//!                                  bincode(<Kind>Payload) ◄────────┘
//! ```
//!
//! Clients must echo `id` and `kind` from the entry they are answering so the
//! server can correlate the response with the element it sent.

use serde::{Deserialize, Serialize};

use crate::element::{
    ClientElement, ContentType, DropdownEntryType, ElementKind, ElementState, FoldoutMode,
    KeyCode, KindConfig, TextAlignment,
};
use crate::id::ElementId;

/// Version stamped on every entries pack.
pub const PROTOCOL_VERSION: u32 = 2;

/// Upper bound on a decoded kind payload. A full plain text field at the
/// largest character limit fits.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

/// Upper bound on a decoded client message.
pub const MAX_CLIENT_MESSAGE_BYTES: usize = MAX_PAYLOAD_BYTES + 1024;

/// Upper bound on a decoded server message.
pub const MAX_SERVER_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Protocol errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Unsupported protocol version {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },
}

// ───────────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────────

/// Kind-specific wire fields of one entry, including the live value where
/// the kind has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryFields {
    Button {
        button_text: String,
        hold_time_secs: f32,
    },
    Dropdown {
        options: Vec<String>,
        default_index: u32,
        entry_type: DropdownEntryType,
        selected: u32,
    },
    GroupHeader {
        reduced_padding: bool,
    },
    Keybind {
        suggested_key: KeyCode,
        prevent_interaction_on_gui: bool,
    },
    PlainText {
        placeholder: String,
        character_limit: u16,
        content_type: ContentType,
        text: String,
    },
    Slider {
        min: f32,
        max: f32,
        default: f32,
        integer: bool,
        value_format: String,
        display_format: String,
        value: f32,
    },
    TextArea {
        foldout: FoldoutMode,
        collapsed_text: Option<String>,
        alignment: TextAlignment,
    },
    TwoButtons {
        option_a: String,
        option_b: String,
        default_is_b: bool,
        is_b: bool,
    },
}

/// Wire representation of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWire {
    pub id: ElementId,
    pub kind: ElementKind,
    pub label: String,
    pub hint: Option<String>,
    pub fields: EntryFields,
}

impl EntryWire {
    /// Build the wire entry for a client element.
    pub fn from_element(element: &ClientElement) -> Self {
        let fields = match (element.config(), element.state()) {
            (KindConfig::Button(c), _) => EntryFields::Button {
                button_text: c.button_text.clone(),
                hold_time_secs: c.hold_time_secs,
            },
            (KindConfig::Dropdown(c), state) => EntryFields::Dropdown {
                options: c.options.clone(),
                default_index: c.default_index as u32,
                entry_type: c.entry_type,
                selected: match state {
                    ElementState::Dropdown { selected, .. } => *selected as u32,
                    _ => c.default_index as u32,
                },
            },
            (KindConfig::GroupHeader(c), _) => EntryFields::GroupHeader {
                reduced_padding: c.reduced_padding,
            },
            (KindConfig::Keybind(c), _) => EntryFields::Keybind {
                suggested_key: c.suggested_key,
                prevent_interaction_on_gui: c.prevent_interaction_on_gui,
            },
            (KindConfig::PlainText(c), state) => EntryFields::PlainText {
                placeholder: c.placeholder.clone(),
                character_limit: c.character_limit,
                content_type: c.content_type,
                text: match state {
                    ElementState::PlainText { text, .. } => text.clone(),
                    _ => String::new(),
                },
            },
            (KindConfig::Slider(c), state) => EntryFields::Slider {
                min: c.min,
                max: c.max,
                default: c.default,
                integer: c.integer,
                value_format: c.value_format.clone(),
                display_format: c.display_format.clone(),
                value: match state {
                    ElementState::Slider { value, .. } => *value,
                    _ => c.default,
                },
            },
            (KindConfig::TextArea(c), _) => EntryFields::TextArea {
                foldout: c.foldout,
                collapsed_text: c.collapsed_text.clone(),
                alignment: c.alignment,
            },
            (KindConfig::TwoButtons(c), state) => EntryFields::TwoButtons {
                option_a: c.option_a.clone(),
                option_b: c.option_b.clone(),
                default_is_b: c.default_is_b,
                is_b: match state {
                    ElementState::TwoButtons { is_b, .. } => *is_b,
                    _ => c.default_is_b,
                },
            },
        };

        Self {
            id: element.id(),
            kind: element.kind(),
            label: element.label().to_string(),
            hint: element.hint().map(str::to_string),
            fields,
        }
    }

    /// Whether this entry carries a live client value.
    pub fn has_value(&self) -> bool {
        matches!(
            self.fields,
            EntryFields::Dropdown { .. }
                | EntryFields::PlainText { .. }
                | EntryFields::Slider { .. }
                | EntryFields::TwoButtons { .. }
        )
    }
}

/// A client's full page, in declared element order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntriesPack {
    pub version: u32,
    pub entries: Vec<EntryWire>,
}

/// Top-level server → client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Entries(EntriesPack),
    /// Replace the content of a text area already on the client.
    TextAreaUpdate { id: ElementId, content: String },
    /// Ask the client to empty a plain text field.
    PlainTextClear { id: ElementId },
    Pong,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode::<_, MAX_SERVER_MESSAGE_BYTES>(bytes)
    }

    /// Unwrap an entries pack, checking its version.
    pub fn into_entries(self) -> Result<EntriesPack, ProtocolError> {
        match self {
            ServerMessage::Entries(pack) if pack.version == PROTOCOL_VERSION => Ok(pack),
            ServerMessage::Entries(pack) => Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: pack.version,
            }),
            other => Err(ProtocolError::Deserialization(format!(
                "expected entries pack, got {other:?}"
            ))),
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────────

/// A client's answer for one element. `payload` is the bincode encoding of
/// the matching `<Kind>Payload` struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientResponse {
    pub id: ElementId,
    pub kind: ElementKind,
    pub payload: Vec<u8>,
}

impl ClientResponse {
    /// Build a response by encoding a typed payload.
    pub fn new<P: Serialize>(
        id: ElementId,
        kind: ElementKind,
        payload: &P,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            id,
            kind,
            payload: encode_payload(payload)?,
        })
    }
}

/// Top-level client → server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request (re)delivery of this client's page.
    FetchPage,
    Response(ClientResponse),
    Ping,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode::<_, MAX_CLIENT_MESSAGE_BYTES>(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownPayload {
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeybindPayload {
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainTextPayload {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderPayload {
    pub value: f32,
    pub dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoButtonsPayload {
    pub is_b: bool,
}

/// Encode a kind payload.
pub fn encode_payload<P: Serialize>(payload: &P) -> Result<Vec<u8>, ProtocolError> {
    encode(payload)
}

/// Decode a kind payload. Anything claiming more than
/// [`MAX_PAYLOAD_BYTES`] is rejected before allocation.
pub fn decode_payload<P: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<P, ProtocolError> {
    decode::<_, MAX_PAYLOAD_BYTES>(bytes)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned, const LIMIT: usize>(
    bytes: &[u8],
) -> Result<T, ProtocolError> {
    let config = bincode::config::standard().with_limit::<LIMIT>();
    let (value, _) = bincode::serde::decode_from_slice(bytes, config)
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    Ok(value)
}
