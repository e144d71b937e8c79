//! Element model: kinds, per-kind configuration, immutable definitions and
//! the per-client mutable copies built from them.
//!
//! ```text
//! ElementDefinition (template, immutable)
//!   ├── id / label / hint / tag
//!   └── KindConfig ── one variant per ElementKind
//!
//! ClientElement (per client, owned)
//!   ├── ElementDefinition (deep copy)
//!   └── ElementState ── live value + previous value
//! ```
//!
//! The kind is never stored separately from the configuration: it is read off
//! the `KindConfig` variant, so the two cannot disagree.

use serde::{Deserialize, Serialize};

use crate::builder::{validate_config, BuildError};
use crate::id::ElementId;
use crate::protocol::{
    self, DropdownPayload, KeybindPayload, PlainTextPayload, SliderPayload, TwoButtonsPayload,
};
use crate::router::RouteError;

/// The fixed category of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementKind {
    Button = 0,
    Dropdown = 1,
    GroupHeader = 2,
    Keybind = 3,
    PlainText = 4,
    Slider = 5,
    TextArea = 6,
    TwoButtons = 7,
}

impl ElementKind {
    /// Kinds whose callback fires on every event, with no change suppression.
    pub fn is_discrete_action(self) -> bool {
        matches!(self, ElementKind::Button | ElementKind::Keybind)
    }

    /// Kinds that never dispatch an element callback.
    pub fn is_stateless(self) -> bool {
        matches!(self, ElementKind::GroupHeader | ElementKind::TextArea)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::Button => "Button",
            ElementKind::Dropdown => "Dropdown",
            ElementKind::GroupHeader => "GroupHeader",
            ElementKind::Keybind => "Keybind",
            ElementKind::PlainText => "PlainText",
            ElementKind::Slider => "Slider",
            ElementKind::TextArea => "TextArea",
            ElementKind::TwoButtons => "TwoButtons",
        };
        f.write_str(name)
    }
}

// ───────────────────────────────────────────────────────────────────
// Kind configuration
// ───────────────────────────────────────────────────────────────────

/// How a dropdown presents its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropdownEntryType {
    #[default]
    Regular,
    Scrollable,
    ScrollableLoop,
    Hybrid,
}

/// Input restriction applied by the client to a plain text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Standard,
    Autocorrected,
    IntegerNumber,
    DecimalNumber,
    Alphanumeric,
    Name,
    EmailAddress,
    Password,
    Pin,
    Custom,
}

/// Collapse behaviour of a text area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FoldoutMode {
    #[default]
    NotCollapsable,
    CollapseOnEntry,
    ExtendOnEntry,
    CollapsedByDefault,
    ExtendedByDefault,
}

/// Horizontal alignment of text area content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
    Justified,
}

/// Platform key code suggested for a keybind. `KeyCode::NONE` leaves it unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub button_text: String,
    /// Seconds the button must be held; 0 means a plain click.
    pub hold_time_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownConfig {
    pub options: Vec<String>,
    pub default_index: usize,
    pub entry_type: DropdownEntryType,
}

impl DropdownConfig {
    /// Clamp a client-supplied index into the option range.
    pub fn validate_index(&self, index: usize) -> usize {
        index.min(self.options.len().saturating_sub(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupHeaderConfig {
    pub reduced_padding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeybindConfig {
    pub suggested_key: KeyCode,
    pub prevent_interaction_on_gui: bool,
}

impl Default for KeybindConfig {
    fn default() -> Self {
        Self {
            suggested_key: KeyCode::NONE,
            prevent_interaction_on_gui: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainTextConfig {
    pub placeholder: String,
    pub character_limit: u16,
    pub content_type: ContentType,
}

impl Default for PlainTextConfig {
    fn default() -> Self {
        Self {
            placeholder: "...".to_string(),
            character_limit: 64,
            content_type: ContentType::Standard,
        }
    }
}

impl PlainTextConfig {
    /// Truncate client input to the character limit (counted in chars, not bytes).
    pub fn validate_text(&self, text: String) -> String {
        let limit = self.character_limit as usize;
        match text.char_indices().nth(limit) {
            Some((byte_idx, _)) => text[..byte_idx].to_string(),
            None => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderConfig {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Only whole numbers are accepted.
    pub integer: bool,
    pub value_format: String,
    pub display_format: String,
}

impl SliderConfig {
    /// Clamp into `[min, max]`, rounding first when the slider is integral.
    pub fn validate_value(&self, value: f32) -> f32 {
        let value = if self.integer { value.round() } else { value };
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextAreaConfig {
    pub foldout: FoldoutMode,
    pub collapsed_text: Option<String>,
    pub alignment: TextAlignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoButtonsConfig {
    pub option_a: String,
    pub option_b: String,
    pub default_is_b: bool,
}

/// Kind-specific constants of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KindConfig {
    Button(ButtonConfig),
    Dropdown(DropdownConfig),
    GroupHeader(GroupHeaderConfig),
    Keybind(KeybindConfig),
    PlainText(PlainTextConfig),
    Slider(SliderConfig),
    TextArea(TextAreaConfig),
    TwoButtons(TwoButtonsConfig),
}

impl KindConfig {
    pub fn kind(&self) -> ElementKind {
        match self {
            KindConfig::Button(_) => ElementKind::Button,
            KindConfig::Dropdown(_) => ElementKind::Dropdown,
            KindConfig::GroupHeader(_) => ElementKind::GroupHeader,
            KindConfig::Keybind(_) => ElementKind::Keybind,
            KindConfig::PlainText(_) => ElementKind::PlainText,
            KindConfig::Slider(_) => ElementKind::Slider,
            KindConfig::TextArea(_) => ElementKind::TextArea,
            KindConfig::TwoButtons(_) => ElementKind::TwoButtons,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Definitions
// ───────────────────────────────────────────────────────────────────

/// Immutable definition of one element inside a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    id: ElementId,
    label: String,
    hint: Option<String>,
    tag: Option<String>,
    config: KindConfig,
}

impl ElementDefinition {
    pub fn new(
        id: ElementId,
        label: impl Into<String>,
        hint: Option<String>,
        tag: Option<String>,
        config: KindConfig,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            hint,
            tag,
            config,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.config.kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn config(&self) -> &KindConfig {
        &self.config
    }
}

// ───────────────────────────────────────────────────────────────────
// Per-client state
// ───────────────────────────────────────────────────────────────────

/// Live value of a client element.
///
/// `previous` is `None` until the first dispatch, so the first legitimate
/// input always counts as a change even when it equals the default.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementState {
    Button,
    Dropdown {
        selected: usize,
        previous: Option<usize>,
    },
    GroupHeader,
    Keybind {
        pressed: bool,
    },
    PlainText {
        text: String,
        previous: Option<String>,
    },
    Slider {
        value: f32,
        dragging: bool,
        previous: Option<f32>,
    },
    TextArea,
    TwoButtons {
        is_b: bool,
        previous: Option<bool>,
    },
}

impl ElementState {
    /// Fresh state for a newly cloned element.
    pub fn initial(config: &KindConfig) -> Self {
        match config {
            KindConfig::Button(_) => ElementState::Button,
            KindConfig::Dropdown(c) => ElementState::Dropdown {
                selected: c.validate_index(c.default_index),
                previous: None,
            },
            KindConfig::GroupHeader(_) => ElementState::GroupHeader,
            KindConfig::Keybind(_) => ElementState::Keybind { pressed: false },
            KindConfig::PlainText(_) => ElementState::PlainText {
                text: String::new(),
                previous: None,
            },
            KindConfig::Slider(c) => ElementState::Slider {
                value: c.validate_value(c.default),
                dragging: false,
                previous: None,
            },
            KindConfig::TextArea(_) => ElementState::TextArea,
            KindConfig::TwoButtons(c) => ElementState::TwoButtons {
                is_b: c.default_is_b,
                previous: None,
            },
        }
    }
}

/// A decoded inbound value, as handed to listeners and event subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Button click or hold completion.
    Interact,
    Selected(usize),
    Pressed(bool),
    Text(String),
    Slider { value: f32, dragging: bool },
    IsB(bool),
    /// Interaction on a stateless element.
    None,
}

/// Result of applying one payload to an element.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Applied {
    pub value: InputValue,
    /// Whether the element callback qualifies for this event.
    pub fire: bool,
}

/// Approximate float equality with a relative tolerance and an absolute floor.
pub fn approximately(a: f32, b: f32) -> bool {
    let tolerance = (1e-6 * a.abs().max(b.abs())).max(f32::EPSILON * 8.0);
    (b - a).abs() < tolerance
}

/// Per-client copy of an [`ElementDefinition`] carrying live state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientElement {
    definition: ElementDefinition,
    state: ElementState,
}

impl ClientElement {
    /// Deep-copy a definition and reset its state.
    pub fn from_definition(definition: &ElementDefinition) -> Self {
        Self {
            state: ElementState::initial(&definition.config),
            definition: definition.clone(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.definition.id
    }

    pub fn kind(&self) -> ElementKind {
        self.definition.kind()
    }

    pub fn label(&self) -> &str {
        &self.definition.label
    }

    pub fn hint(&self) -> Option<&str> {
        self.definition.hint.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.definition.tag.as_deref()
    }

    pub fn config(&self) -> &KindConfig {
        &self.definition.config
    }

    pub fn state(&self) -> &ElementState {
        &self.state
    }

    /// Change this client's label. The template is untouched.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.definition.label = label.into();
    }

    /// Change this client's hint. The template is untouched.
    pub fn set_hint(&mut self, hint: Option<String>) {
        self.definition.hint = hint;
    }

    /// Change this client's kind configuration. The template is untouched.
    ///
    /// `configure` works on a copy that is validated like a template entry
    /// before it replaces the current one; the kind itself cannot change.
    /// The live value is then re-validated against the new configuration,
    /// so a dropdown selection is clamped into the new option range.
    pub fn reconfigure<F>(&mut self, configure: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut KindConfig),
    {
        let id = self.definition.id;
        let mut config = self.definition.config.clone();
        configure(&mut config);

        if config.kind() != self.kind() {
            return Err(BuildError::KindChanged {
                id,
                expected: self.kind(),
                found: config.kind(),
            });
        }
        validate_config(id, &config)?;

        self.definition.config = config;
        self.revalidate_state();
        Ok(())
    }

    fn revalidate_state(&mut self) {
        match (&self.definition.config, &mut self.state) {
            (KindConfig::Dropdown(c), ElementState::Dropdown { selected, .. }) => {
                *selected = c.validate_index(*selected);
            }
            (KindConfig::PlainText(c), ElementState::PlainText { text, .. }) => {
                *text = c.validate_text(std::mem::take(text));
            }
            (KindConfig::Slider(c), ElementState::Slider { value, .. }) => {
                *value = c.validate_value(*value);
            }
            _ => {}
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        match self.state {
            ElementState::Dropdown { selected, .. } => Some(selected),
            _ => None,
        }
    }

    /// Currently selected dropdown option text.
    pub fn selected_option(&self) -> Option<&str> {
        match (&self.definition.config, &self.state) {
            (KindConfig::Dropdown(c), ElementState::Dropdown { selected, .. }) => {
                c.options.get(*selected).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn slider_value(&self) -> Option<f32> {
        match self.state {
            ElementState::Slider { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> Option<bool> {
        match self.state {
            ElementState::Slider { dragging, .. } => Some(dragging),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.state {
            ElementState::PlainText { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_b(&self) -> Option<bool> {
        match self.state {
            ElementState::TwoButtons { is_b, .. } => Some(is_b),
            _ => None,
        }
    }

    pub fn is_pressed(&self) -> Option<bool> {
        match self.state {
            ElementState::Keybind { pressed } => Some(pressed),
            _ => None,
        }
    }

    /// Reset a plain text field to empty. Returns false for other kinds.
    ///
    /// The previous value becomes the empty string too, so a client typing
    /// the pre-clear text again counts as a change.
    pub fn clear_text(&mut self) -> bool {
        match &mut self.state {
            ElementState::PlainText { text, previous } => {
                text.clear();
                *previous = Some(String::new());
                true
            }
            _ => false,
        }
    }

    /// Decode `payload` into the current value and run change detection.
    ///
    /// On success the current value has been replaced and, for stateful
    /// kinds, `previous` now equals the current value.
    pub(crate) fn apply_input(&mut self, payload: &[u8]) -> Result<Applied, RouteError> {
        let id = self.definition.id;
        let kind = self.definition.kind();

        match (&self.definition.config, &mut self.state) {
            (KindConfig::Button(_), ElementState::Button) => Ok(Applied {
                value: InputValue::Interact,
                fire: true,
            }),

            (KindConfig::Keybind(_), ElementState::Keybind { pressed }) => {
                let p: KeybindPayload = decode_payload(id, kind, payload)?;
                *pressed = p.pressed;
                Ok(Applied {
                    value: InputValue::Pressed(p.pressed),
                    fire: true,
                })
            }

            (KindConfig::Dropdown(c), ElementState::Dropdown { selected, previous }) => {
                let p: DropdownPayload = decode_payload(id, kind, payload)?;
                *selected = c.validate_index(p.index as usize);
                let fire = *previous != Some(*selected);
                *previous = Some(*selected);
                Ok(Applied {
                    value: InputValue::Selected(*selected),
                    fire,
                })
            }

            (KindConfig::PlainText(c), ElementState::PlainText { text, previous }) => {
                let p: PlainTextPayload = decode_payload(id, kind, payload)?;
                *text = c.validate_text(p.text);
                let fire = previous.as_deref() != Some(text.as_str());
                *previous = Some(text.clone());
                Ok(Applied {
                    value: InputValue::Text(text.clone()),
                    fire,
                })
            }

            (
                KindConfig::Slider(c),
                ElementState::Slider {
                    value,
                    dragging,
                    previous,
                },
            ) => {
                let p: SliderPayload = decode_payload(id, kind, payload)?;
                if !p.value.is_finite() {
                    return Err(RouteError::MalformedEntry {
                        id,
                        reason: format!("non-finite slider value {}", p.value),
                    });
                }
                *value = c.validate_value(p.value);
                *dragging = p.dragging;
                let fire = !matches!(*previous, Some(prev) if approximately(prev, *value));
                *previous = Some(*value);
                Ok(Applied {
                    value: InputValue::Slider {
                        value: *value,
                        dragging: *dragging,
                    },
                    fire,
                })
            }

            (KindConfig::TwoButtons(_), ElementState::TwoButtons { is_b, previous }) => {
                let p: TwoButtonsPayload = decode_payload(id, kind, payload)?;
                *is_b = p.is_b;
                let fire = *previous != Some(*is_b);
                *previous = Some(*is_b);
                Ok(Applied {
                    value: InputValue::IsB(*is_b),
                    fire,
                })
            }

            (KindConfig::GroupHeader(_), ElementState::GroupHeader)
            | (KindConfig::TextArea(_), ElementState::TextArea) => Ok(Applied {
                value: InputValue::None,
                fire: false,
            }),

            (config, state) => {
                log::error!(
                    "Element {id}: {} config paired with {state:?} state",
                    config.kind()
                );
                debug_assert!(false, "element {id} state does not match its kind");
                Err(RouteError::KindMismatch {
                    id,
                    expected: config.kind(),
                })
            }
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    id: ElementId,
    kind: ElementKind,
    payload: &[u8],
) -> Result<T, RouteError> {
    if payload.is_empty() {
        return Err(RouteError::MalformedEntry {
            id,
            reason: format!("empty {kind} payload"),
        });
    }
    protocol::decode_payload(payload).map_err(|e| RouteError::Decode {
        id,
        kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_payload;

    fn slider_def() -> ElementDefinition {
        ElementDefinition::new(
            3,
            "Volume",
            None,
            None,
            KindConfig::Slider(SliderConfig {
                min: 0.0,
                max: 10.0,
                default: 2.0,
                integer: false,
                value_format: "0.##".into(),
                display_format: "{0}".into(),
            }),
        )
    }

    fn dropdown_def() -> ElementDefinition {
        ElementDefinition::new(
            4,
            "Mode",
            Some("Pick one".into()),
            Some("mode".into()),
            KindConfig::Dropdown(DropdownConfig {
                options: vec!["A".into(), "B".into(), "C".into()],
                default_index: 1,
                entry_type: DropdownEntryType::Regular,
            }),
        )
    }

    #[test]
    fn test_kind_follows_config() {
        assert_eq!(slider_def().kind(), ElementKind::Slider);
        assert_eq!(dropdown_def().kind(), ElementKind::Dropdown);
    }

    #[test]
    fn test_initial_state_uses_defaults() {
        let slider = ClientElement::from_definition(&slider_def());
        assert_eq!(slider.slider_value(), Some(2.0));
        assert_eq!(slider.is_dragging(), Some(false));

        let dropdown = ClientElement::from_definition(&dropdown_def());
        assert_eq!(dropdown.selected_index(), Some(1));
        assert_eq!(dropdown.selected_option(), Some("B"));
        assert_eq!(dropdown.tag(), Some("mode"));
        assert_eq!(dropdown.hint(), Some("Pick one"));
    }

    #[test]
    fn test_first_input_equal_to_default_still_fires() {
        let mut dropdown = ClientElement::from_definition(&dropdown_def());
        let payload = encode_payload(&DropdownPayload { index: 1 }).unwrap();

        let applied = dropdown.apply_input(&payload).unwrap();
        assert!(applied.fire);
        assert_eq!(applied.value, InputValue::Selected(1));

        let applied = dropdown.apply_input(&payload).unwrap();
        assert!(!applied.fire);
    }

    #[test]
    fn test_dropdown_index_clamped() {
        let mut dropdown = ClientElement::from_definition(&dropdown_def());
        let payload = encode_payload(&DropdownPayload { index: 99 }).unwrap();
        dropdown.apply_input(&payload).unwrap();
        assert_eq!(dropdown.selected_index(), Some(2));
    }

    #[test]
    fn test_slider_approximate_equality_suppresses_noise() {
        let mut slider = ClientElement::from_definition(&slider_def());
        let first = encode_payload(&SliderPayload { value: 5.0, dragging: true }).unwrap();
        let noisy = encode_payload(&SliderPayload {
            value: 5.0 + f32::EPSILON,
            dragging: false,
        })
        .unwrap();

        assert!(slider.apply_input(&first).unwrap().fire);
        assert!(!slider.apply_input(&noisy).unwrap().fire);
        assert_eq!(slider.is_dragging(), Some(false));
    }

    #[test]
    fn test_slider_clamps_and_rounds() {
        let mut def = slider_def();
        if let KindConfig::Slider(c) = &mut def.config {
            c.integer = true;
        }
        let mut slider = ClientElement::from_definition(&def);
        let payload = encode_payload(&SliderPayload { value: 3.6, dragging: false }).unwrap();
        slider.apply_input(&payload).unwrap();
        assert_eq!(slider.slider_value(), Some(4.0));

        let payload = encode_payload(&SliderPayload { value: 50.0, dragging: false }).unwrap();
        slider.apply_input(&payload).unwrap();
        assert_eq!(slider.slider_value(), Some(10.0));
    }

    #[test]
    fn test_slider_rejects_nan() {
        let mut slider = ClientElement::from_definition(&slider_def());
        let payload = encode_payload(&SliderPayload {
            value: f32::NAN,
            dragging: false,
        })
        .unwrap();
        assert!(matches!(
            slider.apply_input(&payload),
            Err(RouteError::MalformedEntry { .. })
        ));
        assert_eq!(slider.slider_value(), Some(2.0));
    }

    #[test]
    fn test_plain_text_truncated_to_limit() {
        let def = ElementDefinition::new(
            5,
            "Name",
            None,
            None,
            KindConfig::PlainText(PlainTextConfig {
                character_limit: 3,
                ..PlainTextConfig::default()
            }),
        );
        let mut field = ClientElement::from_definition(&def);
        let payload = encode_payload(&PlainTextPayload { text: "héllo".into() }).unwrap();
        let applied = field.apply_input(&payload).unwrap();
        assert!(applied.fire);
        assert_eq!(field.text(), Some("hél"));
    }

    #[test]
    fn test_clear_text_resets_previous() {
        let def = ElementDefinition::new(
            5,
            "Name",
            None,
            None,
            KindConfig::PlainText(PlainTextConfig::default()),
        );
        let mut field = ClientElement::from_definition(&def);
        let payload = encode_payload(&PlainTextPayload { text: "abc".into() }).unwrap();
        field.apply_input(&payload).unwrap();

        assert!(field.clear_text());
        assert_eq!(field.text(), Some(""));
        assert!(field.apply_input(&payload).unwrap().fire);

        let empty = encode_payload(&PlainTextPayload { text: String::new() }).unwrap();
        field.clear_text();
        assert!(!field.apply_input(&empty).unwrap().fire);
    }

    #[test]
    fn test_empty_payload_is_malformed() {
        let mut dropdown = ClientElement::from_definition(&dropdown_def());
        assert!(matches!(
            dropdown.apply_input(&[]),
            Err(RouteError::MalformedEntry { id: 4, .. })
        ));
    }

    #[test]
    fn test_garbage_payload_is_decode_error() {
        let mut field = ClientElement::from_definition(&ElementDefinition::new(
            5,
            "Name",
            None,
            None,
            KindConfig::PlainText(PlainTextConfig::default()),
        ));
        // Length prefix claims a few more bytes than present.
        let garbage = vec![0x10, b'a', b'b'];
        assert!(matches!(
            field.apply_input(&garbage),
            Err(RouteError::Decode { id: 5, kind: ElementKind::PlainText, .. })
        ));
        assert_eq!(field.text(), Some(""));
    }

    #[test]
    fn test_huge_length_prefix_is_decode_error() {
        let mut field = ClientElement::from_definition(&ElementDefinition::new(
            5,
            "Name",
            None,
            None,
            KindConfig::PlainText(PlainTextConfig::default()),
        ));
        // u64 varint claiming 1 TiB of text.
        let mut payload = vec![0xFD];
        payload.extend_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(matches!(
            field.apply_input(&payload),
            Err(RouteError::Decode { id: 5, kind: ElementKind::PlainText, .. })
        ));
    }

    #[test]
    fn test_button_ignores_payload() {
        let def = ElementDefinition::new(
            1,
            "Test",
            None,
            None,
            KindConfig::Button(ButtonConfig {
                button_text: "Click".into(),
                hold_time_secs: 0.0,
            }),
        );
        let mut button = ClientElement::from_definition(&def);
        assert!(button.apply_input(&[]).unwrap().fire);
        assert!(button.apply_input(&[]).unwrap().fire);
    }

    #[test]
    fn test_set_label_only_touches_clone() {
        let def = dropdown_def();
        let mut element = ClientElement::from_definition(&def);
        element.set_label("Renamed");
        element.set_hint(None);
        assert_eq!(element.label(), "Renamed");
        assert_eq!(element.hint(), None);
        assert_eq!(def.label(), "Mode");
        assert_eq!(def.hint(), Some("Pick one"));
    }

    #[test]
    fn test_reconfigure_dropdown_clamps_selection() {
        let def = dropdown_def();
        let mut element = ClientElement::from_definition(&def);
        let payload = encode_payload(&DropdownPayload { index: 2 }).unwrap();
        element.apply_input(&payload).unwrap();

        element
            .reconfigure(|config| {
                if let KindConfig::Dropdown(c) = config {
                    c.options = vec!["Only".into(), "Two".into()];
                    c.default_index = 0;
                }
            })
            .unwrap();

        assert_eq!(element.selected_index(), Some(1));
        assert_eq!(element.selected_option(), Some("Two"));
        match def.config() {
            KindConfig::Dropdown(c) => assert_eq!(c.options.len(), 3),
            other => panic!("Expected dropdown config, got {other:?}"),
        }
    }

    #[test]
    fn test_reconfigure_rejects_invalid_config() {
        let mut element = ClientElement::from_definition(&dropdown_def());
        let before = element.clone();

        let err = element
            .reconfigure(|config| {
                if let KindConfig::Dropdown(c) = config {
                    c.options.clear();
                }
            })
            .unwrap_err();
        assert_eq!(err, BuildError::EmptyDropdown { id: 4 });

        let err = element
            .reconfigure(|config| *config = KindConfig::GroupHeader(GroupHeaderConfig::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::KindChanged { id: 4, expected: ElementKind::Dropdown, .. }
        ));
        assert_eq!(element, before);
    }

    #[test]
    fn test_reconfigure_slider_range_clamps_value() {
        let mut slider = ClientElement::from_definition(&slider_def());
        let payload = encode_payload(&SliderPayload { value: 9.0, dragging: false }).unwrap();
        slider.apply_input(&payload).unwrap();

        slider
            .reconfigure(|config| {
                if let KindConfig::Slider(c) = config {
                    c.max = 5.0;
                }
            })
            .unwrap();
        assert_eq!(slider.slider_value(), Some(5.0));

        assert!(matches!(
            slider.reconfigure(|config| {
                if let KindConfig::Slider(c) = config {
                    c.min = f32::NAN;
                }
            }),
            Err(BuildError::InvalidSliderRange { id: 3, .. })
        ));
    }

    #[test]
    fn test_approximately() {
        assert!(approximately(1.0, 1.0));
        assert!(approximately(0.0, f32::EPSILON));
        assert!(!approximately(1.0, 1.01));
        assert!(approximately(100000.0, 100000.01));
    }
}
