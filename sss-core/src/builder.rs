//! Fluent page construction.
//!
//! A [`PageBuilder`] appends one element per `add_*` call, each with the next
//! id from its [`IdAllocator`]. Elements are described by an [`Entry`] draft
//! that carries the kind configuration, optional hint/tag and an optional
//! typed callback:
//!
//! ```
//! use sss_core::builder::{Button, GroupHeader, PageBuilder, Slider};
//!
//! let template = PageBuilder::new()
//!     .add_group_header(GroupHeader::new("Settings"))
//!     .add_button(Button::new("Test", "Click").hold_time(2.0).on_interact(|ctx| {
//!         println!("{} pressed {}", ctx.client, ctx.element.label());
//!     }))
//!     .add_slider(Slider::new("Volume", 0.0, 10.0).default_value(5.0))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(template.len(), 3);
//! ```
//!
//! Building is single-threaded; the builder is consumed by [`PageBuilder::build`],
//! which validates every invariant and is the only way to get a template.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::element::{
    ButtonConfig, ContentType, DropdownConfig, DropdownEntryType, ElementDefinition, ElementKind,
    FoldoutMode, GroupHeaderConfig, InputValue, KeyCode, KeybindConfig, KindConfig,
    PlainTextConfig, SliderConfig, TextAlignment, TextAreaConfig, TwoButtonsConfig,
};
use crate::id::{ElementId, IdAllocator};
use crate::page::{ClientId, ClientPage};
use crate::router::{Handler, HandlerTable, InputContext};

/// Configuration errors. A template that fails to build must not be served,
/// and a rejected per-client reconfiguration leaves the element untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("Element id space exhausted")]
    IdSpaceExhausted,
    #[error("Duplicate element id {0}")]
    DuplicateId(ElementId),
    #[error("Element id {id} follows {previous}; ids must increase in declaration order")]
    NonIncreasingId { previous: ElementId, id: ElementId },
    #[error("Dropdown {id} has no options")]
    EmptyDropdown { id: ElementId },
    #[error("Dropdown {id} default index {index} out of range for {len} options")]
    DefaultIndexOutOfRange { id: ElementId, index: usize, len: usize },
    #[error("Slider {id} has invalid range {min}..{max}")]
    InvalidSliderRange { id: ElementId, min: f32, max: f32 },
    #[error("Handler registered for unknown element {0}")]
    MissingHandlerTarget(ElementId),
    #[error("Handler registered for {kind} element {id}, which never dispatches")]
    StatelessHandler { id: ElementId, kind: ElementKind },
    #[error("Element {id} is a {expected}; it cannot become a {found}")]
    KindChanged {
        id: ElementId,
        expected: ElementKind,
        found: ElementKind,
    },
}

// ───────────────────────────────────────────────────────────────────
// Entry drafts
// ───────────────────────────────────────────────────────────────────

/// Draft of one element before it is added to a builder.
pub struct Entry<C> {
    label: String,
    hint: Option<String>,
    tag: Option<String>,
    config: C,
    handler: Option<Handler>,
}

pub type Button = Entry<ButtonConfig>;
pub type Dropdown = Entry<DropdownConfig>;
pub type GroupHeader = Entry<GroupHeaderConfig>;
pub type Keybind = Entry<KeybindConfig>;
pub type PlainText = Entry<PlainTextConfig>;
pub type Slider = Entry<SliderConfig>;
pub type TextArea = Entry<TextAreaConfig>;
pub type TwoButtons = Entry<TwoButtonsConfig>;

impl<C> Entry<C> {
    fn with_config(label: impl Into<String>, config: C) -> Self {
        Self {
            label: label.into(),
            hint: None,
            tag: None,
            config,
            handler: None,
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Free-form tag for looking the element up on a client page.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }
}

impl Entry<ButtonConfig> {
    pub fn new(label: impl Into<String>, button_text: impl Into<String>) -> Self {
        Self::with_config(
            label,
            ButtonConfig {
                button_text: button_text.into(),
                hold_time_secs: 0.0,
            },
        )
    }

    pub fn hold_time(mut self, secs: f32) -> Self {
        self.config.hold_time_secs = secs.max(0.0);
        self
    }

    /// Called on every click, including repeats.
    pub fn on_interact<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>) + Send + Sync + 'static,
    {
        self.handler(f)
    }
}

impl Entry<DropdownConfig> {
    pub fn new<I, S>(label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(
            label,
            DropdownConfig {
                options: options.into_iter().map(Into::into).collect(),
                default_index: 0,
                entry_type: DropdownEntryType::Regular,
            },
        )
    }

    pub fn default_index(mut self, index: usize) -> Self {
        self.config.default_index = index;
        self
    }

    pub fn entry_type(mut self, entry_type: DropdownEntryType) -> Self {
        self.config.entry_type = entry_type;
        self
    }

    /// Called with the selected index when the selection changes.
    pub fn on_changed<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>, usize) + Send + Sync + 'static,
    {
        self.handler(move |ctx| {
            if let InputValue::Selected(index) = ctx.value {
                f(ctx, *index);
            }
        })
    }
}

impl Entry<GroupHeaderConfig> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_config(label, GroupHeaderConfig::default())
    }

    pub fn reduced_padding(mut self) -> Self {
        self.config.reduced_padding = true;
        self
    }
}

impl Entry<KeybindConfig> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_config(label, KeybindConfig::default())
    }

    pub fn suggested_key(mut self, key: KeyCode) -> Self {
        self.config.suggested_key = key;
        self
    }

    pub fn prevent_interaction_on_gui(mut self, prevent: bool) -> Self {
        self.config.prevent_interaction_on_gui = prevent;
        self
    }

    /// Called on every key event with the pressed state.
    pub fn on_input<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>, bool) + Send + Sync + 'static,
    {
        self.handler(move |ctx| {
            if let InputValue::Pressed(pressed) = ctx.value {
                f(ctx, *pressed);
            }
        })
    }
}

impl Entry<PlainTextConfig> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_config(label, PlainTextConfig::default())
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.config.placeholder = placeholder.into();
        self
    }

    pub fn character_limit(mut self, limit: u16) -> Self {
        self.config.character_limit = limit;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.config.content_type = content_type;
        self
    }

    /// Called with the new text when it changes.
    pub fn on_changed<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>, &str) + Send + Sync + 'static,
    {
        self.handler(move |ctx| {
            if let InputValue::Text(text) = ctx.value {
                f(ctx, text.as_str());
            }
        })
    }
}

impl Entry<SliderConfig> {
    pub fn new(label: impl Into<String>, min: f32, max: f32) -> Self {
        Self::with_config(
            label,
            SliderConfig {
                min,
                max,
                default: 0.0,
                integer: false,
                value_format: "0.##".to_string(),
                display_format: "{0}".to_string(),
            },
        )
    }

    pub fn default_value(mut self, value: f32) -> Self {
        self.config.default = value;
        self
    }

    pub fn integer(mut self) -> Self {
        self.config.integer = true;
        self
    }

    pub fn value_format(mut self, format: impl Into<String>) -> Self {
        self.config.value_format = format.into();
        self
    }

    pub fn display_format(mut self, format: impl Into<String>) -> Self {
        self.config.display_format = format.into();
        self
    }

    /// Called with the new value when it moves by more than float noise.
    pub fn on_changed<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>, f32) + Send + Sync + 'static,
    {
        self.handler(move |ctx| {
            if let InputValue::Slider { value, .. } = ctx.value {
                f(ctx, *value);
            }
        })
    }
}

impl Entry<TextAreaConfig> {
    /// A text area's label is its content.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_config(content, TextAreaConfig::default())
    }

    pub fn foldout(mut self, mode: FoldoutMode) -> Self {
        self.config.foldout = mode;
        self
    }

    pub fn collapsed_text(mut self, text: impl Into<String>) -> Self {
        self.config.collapsed_text = Some(text.into());
        self
    }

    pub fn alignment(mut self, alignment: TextAlignment) -> Self {
        self.config.alignment = alignment;
        self
    }
}

impl Entry<TwoButtonsConfig> {
    pub fn new(
        label: impl Into<String>,
        option_a: impl Into<String>,
        option_b: impl Into<String>,
    ) -> Self {
        Self::with_config(
            label,
            TwoButtonsConfig {
                option_a: option_a.into(),
                option_b: option_b.into(),
                default_is_b: false,
            },
        )
    }

    pub fn default_b(mut self, is_b: bool) -> Self {
        self.config.default_is_b = is_b;
        self
    }

    /// Called with `true` when option B becomes selected, `false` for A.
    pub fn on_changed<F>(self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>, bool) + Send + Sync + 'static,
    {
        self.handler(move |ctx| {
            if let InputValue::IsB(is_b) = ctx.value {
                f(ctx, *is_b);
            }
        })
    }
}

// ───────────────────────────────────────────────────────────────────
// Builder
// ───────────────────────────────────────────────────────────────────

/// Append-only page builder.
pub struct PageBuilder {
    allocator: Arc<IdAllocator>,
    definitions: Vec<ElementDefinition>,
    handlers: HandlerTable,
    /// First allocation failure, reported by `build`.
    error: Option<BuildError>,
}

impl PageBuilder {
    /// Builder with its own allocator: ids are unique within this template only.
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(IdAllocator::new()))
    }

    /// Builder drawing ids from a shared allocator, so templates built from
    /// the same allocator never collide.
    pub fn with_allocator(allocator: Arc<IdAllocator>) -> Self {
        Self {
            allocator,
            definitions: Vec::new(),
            handlers: HandlerTable::default(),
            error: None,
        }
    }

    pub fn add_button(self, entry: Button) -> Self {
        self.push(entry, KindConfig::Button)
    }

    pub fn add_dropdown(self, entry: Dropdown) -> Self {
        self.push(entry, KindConfig::Dropdown)
    }

    pub fn add_group_header(self, entry: GroupHeader) -> Self {
        self.push(entry, KindConfig::GroupHeader)
    }

    pub fn add_keybind(self, entry: Keybind) -> Self {
        self.push(entry, KindConfig::Keybind)
    }

    pub fn add_plain_text(self, entry: PlainText) -> Self {
        self.push(entry, KindConfig::PlainText)
    }

    pub fn add_slider(self, entry: Slider) -> Self {
        self.push(entry, KindConfig::Slider)
    }

    pub fn add_text_area(self, entry: TextArea) -> Self {
        self.push(entry, KindConfig::TextArea)
    }

    pub fn add_two_buttons(self, entry: TwoButtons) -> Self {
        self.push(entry, KindConfig::TwoButtons)
    }

    /// Page-level listener, called for every routed input before the
    /// element's own callback, whether or not the value changed.
    pub fn on_user_input<F>(mut self, f: F) -> Self
    where
        F: Fn(&InputContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.set_listener(Arc::new(f));
        self
    }

    /// Number of elements added so far.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Finalize into an immutable template.
    pub fn build(self) -> Result<PageTemplate, BuildError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        PageTemplate::from_parts(self.definitions, self.handlers)
    }

    fn push<C>(mut self, entry: Entry<C>, wrap: fn(C) -> KindConfig) -> Self {
        if self.error.is_some() {
            return self;
        }
        let id = match self.allocator.next() {
            Ok(id) => id,
            Err(e) => {
                self.error = Some(e);
                return self;
            }
        };

        let Entry {
            label,
            hint,
            tag,
            config,
            handler,
        } = entry;
        if let Some(handler) = handler {
            self.handlers.insert(id, handler);
        }
        self.definitions
            .push(ElementDefinition::new(id, label, hint, tag, wrap(config)));
        self
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────────
// Template
// ───────────────────────────────────────────────────────────────────

/// Immutable, shareable page definition.
pub struct PageTemplate {
    definitions: Vec<ElementDefinition>,
    handlers: HandlerTable,
}

impl PageTemplate {
    /// Assemble a template from raw parts, validating every invariant:
    /// strictly increasing unique ids, well-formed kind configs, and handlers
    /// that point at existing, dispatching elements.
    pub fn from_parts(
        definitions: Vec<ElementDefinition>,
        handlers: HandlerTable,
    ) -> Result<Self, BuildError> {
        let mut seen = HashSet::with_capacity(definitions.len());
        let mut previous: Option<ElementId> = None;

        for def in &definitions {
            let id = def.id();
            if !seen.insert(id) {
                return Err(BuildError::DuplicateId(id));
            }
            if let Some(prev) = previous {
                if id <= prev {
                    return Err(BuildError::NonIncreasingId { previous: prev, id });
                }
            }
            previous = Some(id);
            validate_config(id, def.config())?;
        }

        let kinds: HashMap<ElementId, ElementKind> =
            definitions.iter().map(|d| (d.id(), d.kind())).collect();
        for id in handlers.element_ids() {
            match kinds.get(&id) {
                None => return Err(BuildError::MissingHandlerTarget(id)),
                Some(kind) if kind.is_stateless() => {
                    return Err(BuildError::StatelessHandler { id, kind: *kind })
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            definitions,
            handlers,
        })
    }

    pub fn definitions(&self) -> &[ElementDefinition] {
        &self.definitions
    }

    pub fn definition(&self, id: ElementId) -> Option<&ElementDefinition> {
        self.definitions.iter().find(|d| d.id() == id)
    }

    /// Ids in declaration order.
    pub fn ids(&self) -> Vec<ElementId> {
        self.definitions.iter().map(ElementDefinition::id).collect()
    }

    pub fn contains(&self, id: ElementId, kind: ElementKind) -> bool {
        self.definition(id).is_some_and(|d| d.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Deep-clone every definition into a fresh page for `owner`.
    pub fn instantiate(&self, owner: ClientId) -> ClientPage {
        ClientPage::from_definitions(owner, &self.definitions)
    }

    pub(crate) fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }
}

impl std::fmt::Debug for PageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTemplate")
            .field("definitions", &self.definitions)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

pub(crate) fn validate_config(id: ElementId, config: &KindConfig) -> Result<(), BuildError> {
    match config {
        KindConfig::Dropdown(c) => {
            if c.options.is_empty() {
                return Err(BuildError::EmptyDropdown { id });
            }
            if c.default_index >= c.options.len() {
                return Err(BuildError::DefaultIndexOutOfRange {
                    id,
                    index: c.default_index,
                    len: c.options.len(),
                });
            }
        }
        KindConfig::Slider(c) => {
            if !c.min.is_finite() || !c.max.is_finite() || c.min > c.max {
                return Err(BuildError::InvalidSliderRange {
                    id,
                    min: c.min,
                    max: c.max,
                });
            }
        }
        KindConfig::Button(_)
        | KindConfig::GroupHeader(_)
        | KindConfig::Keybind(_)
        | KindConfig::PlainText(_)
        | KindConfig::TextArea(_)
        | KindConfig::TwoButtons(_) => {}
    }
    Ok(())
}
