//! Per-client page instances.
//!
//! A [`ClientPage`] is an owned, deep copy of one template: same elements,
//! same order, same ids, but its own values. Nothing inside a page points back
//! at the template or at another client's page.

use uuid::Uuid;

use crate::element::{ClientElement, ElementDefinition, ElementKind};
use crate::id::ElementId;

/// Identity of a connected client, as assigned by the transport.
pub type ClientId = Uuid;

/// One client's live copy of a page template.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPage {
    owner: ClientId,
    elements: Vec<ClientElement>,
}

impl ClientPage {
    pub(crate) fn from_definitions(owner: ClientId, definitions: &[ElementDefinition]) -> Self {
        Self {
            owner,
            elements: definitions
                .iter()
                .map(ClientElement::from_definition)
                .collect(),
        }
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    /// Elements in template declaration order.
    pub fn elements(&self) -> &[ClientElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> Option<&ClientElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut ClientElement> {
        self.elements.iter_mut().find(|e| e.id() == id)
    }

    /// Element matching both id and kind; the routing lookup.
    pub fn find(&self, id: ElementId, kind: ElementKind) -> Option<&ClientElement> {
        self.element(id).filter(|e| e.kind() == kind)
    }

    pub(crate) fn find_mut(
        &mut self,
        id: ElementId,
        kind: ElementKind,
    ) -> Option<&mut ClientElement> {
        self.element_mut(id).filter(|e| e.kind() == kind)
    }

    pub fn contains(&self, id: ElementId, kind: ElementKind) -> bool {
        self.find(id, kind).is_some()
    }

    /// First element carrying `tag`.
    pub fn element_by_tag(&self, tag: &str) -> Option<&ClientElement> {
        self.elements.iter().find(|e| e.tag() == Some(tag))
    }

    pub fn element_by_tag_mut(&mut self, tag: &str) -> Option<&mut ClientElement> {
        self.elements.iter_mut().find(|e| e.tag() == Some(tag))
    }

    /// Every element carrying `tag`, in page order.
    pub fn elements_by_tag<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a ClientElement> + 'a {
        self.elements.iter().filter(move |e| e.tag() == Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ButtonConfig, GroupHeaderConfig, KindConfig, TwoButtonsConfig};

    fn definitions() -> Vec<ElementDefinition> {
        vec![
            ElementDefinition::new(
                1,
                "Header",
                None,
                Some("top".into()),
                KindConfig::GroupHeader(GroupHeaderConfig::default()),
            ),
            ElementDefinition::new(
                2,
                "Fire",
                None,
                Some("action".into()),
                KindConfig::Button(ButtonConfig {
                    button_text: "Go".into(),
                    hold_time_secs: 0.0,
                }),
            ),
            ElementDefinition::new(
                3,
                "Side",
                None,
                Some("action".into()),
                KindConfig::TwoButtons(TwoButtonsConfig {
                    option_a: "A".into(),
                    option_b: "B".into(),
                    default_is_b: false,
                }),
            ),
        ]
    }

    #[test]
    fn test_page_preserves_order_and_ids() {
        let owner = Uuid::new_v4();
        let page = ClientPage::from_definitions(owner, &definitions());

        assert_eq!(page.owner(), owner);
        assert_eq!(page.len(), 3);
        let ids: Vec<_> = page.elements().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_find_requires_matching_kind() {
        let page = ClientPage::from_definitions(Uuid::new_v4(), &definitions());
        assert!(page.find(2, ElementKind::Button).is_some());
        assert!(page.find(2, ElementKind::Slider).is_none());
        assert!(page.find(9999, ElementKind::Button).is_none());
        assert!(page.contains(3, ElementKind::TwoButtons));
    }

    #[test]
    fn test_tag_lookup() {
        let mut page = ClientPage::from_definitions(Uuid::new_v4(), &definitions());

        assert_eq!(page.element_by_tag("top").map(|e| e.id()), Some(1));
        let tagged: Vec<_> = page.elements_by_tag("action").map(|e| e.id()).collect();
        assert_eq!(tagged, vec![2, 3]);
        assert!(page.element_by_tag("missing").is_none());

        page.element_by_tag_mut("top").unwrap().set_label("Renamed");
        assert_eq!(page.element(1).unwrap().label(), "Renamed");
    }

    #[test]
    fn test_pages_are_independent() {
        let defs = definitions();
        let mut a = ClientPage::from_definitions(Uuid::new_v4(), &defs);
        let b = ClientPage::from_definitions(Uuid::new_v4(), &defs);

        a.element_mut(2).unwrap().set_label("Changed");
        assert_eq!(b.element(2).unwrap().label(), "Fire");
        assert_eq!(defs[1].label(), "Fire");
    }
}
