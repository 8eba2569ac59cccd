//! Click events and the click-delegation listener registry.
//!
//! Every interactive element on the page is a link to `/click?...`. The
//! server turns the query back into a [`ClickEvent`] (the clicked element
//! followed by its ancestors), and the app offers it to each registered
//! listener in registration order.

use std::collections::HashMap;

use crate::page::{FILE_ITEM_CLASS, FILE_LIST_ID, TOC_ID, TOC_ITEM_CLASS};

/// One element on a click's propagation path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// `data-*` attributes, without the `data-` prefix.
    pub data: Vec<(String, String)>,
}

impl Element {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_class(class: impl Into<String>) -> Self {
        Self {
            classes: vec![class.into()],
            ..Self::default()
        }
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A click: the origin element first, then its ancestors outward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    path: Vec<Element>,
}

impl ClickEvent {
    pub fn new(path: Vec<Element>) -> Self {
        Self { path }
    }

    pub fn on_file(filename: &str) -> Self {
        Self::new(vec![
            Element::with_class(FILE_ITEM_CLASS).data("file", filename),
            Element::with_id(FILE_LIST_ID),
        ])
    }

    pub fn on_heading(anchor_id: &str) -> Self {
        Self::new(vec![
            Element::with_class(TOC_ITEM_CLASS).data("id", anchor_id),
            Element::with_id(TOC_ID),
        ])
    }

    pub fn on_id(id: &str) -> Self {
        Self::new(vec![Element::with_id(id)])
    }

    /// Rebuild a click from `/click` query parameters.
    ///
    /// `file` targets a file-list entry, `heading` an outline entry, and `id`
    /// any element by id. Unrecognised queries yield a click on nothing.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        if let Some(file) = params.get("file") {
            Self::on_file(file)
        } else if let Some(anchor) = params.get("heading") {
            Self::on_heading(anchor)
        } else if let Some(id) = params.get("id") {
            Self::on_id(id)
        } else {
            Self::default()
        }
    }

    pub fn origin(&self) -> Option<&Element> {
        self.path.first()
    }

    /// Nearest element on the path (origin included) with the given id.
    pub fn closest_id(&self, id: &str) -> Option<&Element> {
        self.path.iter().find(|e| e.id.as_deref() == Some(id))
    }

    /// Nearest element on the path (origin included) with the given class.
    pub fn closest_class(&self, class: &str) -> Option<&Element> {
        self.path.iter().find(|e| e.has_class(class))
    }
}

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

/// The delegation listeners the page knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    ThemeToggle,
    FileList,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Active click listeners, at most one per kind.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: u64,
    active: Vec<(ListenerId, ListenerKind)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener of `kind`.
    ///
    /// If one is already active, its id is returned and nothing new is bound.
    pub fn register(&mut self, kind: ListenerKind) -> ListenerId {
        if let Some((id, _)) = self.active.iter().find(|(_, k)| *k == kind) {
            log::debug!("[listeners] kind={kind:?} already registered id={}", id.0);
            return *id;
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.active.push((id, kind));
        log::debug!("[listeners] kind={kind:?} registered id={}", id.0);
        id
    }

    /// Remove a listener. Returns `false` if it was not active.
    pub fn dispose(&mut self, id: ListenerId) -> bool {
        let before = self.active.len();
        self.active.retain(|(active_id, _)| *active_id != id);
        let removed = self.active.len() != before;
        if removed {
            log::debug!("[listeners] disposed id={}", id.0);
        }
        removed
    }

    /// Active listener kinds in registration order.
    pub fn active(&self) -> Vec<ListenerKind> {
        self.active.iter().map(|(_, kind)| *kind).collect()
    }

    pub fn is_registered(&self, kind: ListenerKind) -> bool {
        self.active.iter().any(|(_, k)| *k == kind)
    }

}

#[cfg(test)]
impl ListenerRegistry {
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::THEME_TOGGLE_ID;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn register_is_idempotent_per_kind() {
        let mut registry = ListenerRegistry::new();
        let a = registry.register(ListenerKind::ThemeToggle);
        let b = registry.register(ListenerKind::ThemeToggle);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn active_keeps_registration_order() {
        let mut registry = ListenerRegistry::new();
        registry.register(ListenerKind::ThemeToggle);
        registry.register(ListenerKind::FileList);
        registry.register(ListenerKind::Outline);
        assert_eq!(
            registry.active(),
            vec![
                ListenerKind::ThemeToggle,
                ListenerKind::FileList,
                ListenerKind::Outline
            ]
        );
    }

    #[test]
    fn dispose_removes_once() {
        let mut registry = ListenerRegistry::new();
        let id = registry.register(ListenerKind::FileList);
        assert!(registry.dispose(id));
        assert!(!registry.dispose(id));
        assert!(!registry.is_registered(ListenerKind::FileList));
        assert!(registry.is_empty());
    }

    #[test]
    fn reregister_after_dispose_gets_fresh_id() {
        let mut registry = ListenerRegistry::new();
        let first = registry.register(ListenerKind::Outline);
        registry.dispose(first);
        let second = registry.register(ListenerKind::Outline);
        assert_ne!(first, second);
    }

    #[test]
    fn click_from_file_param() {
        let click = ClickEvent::from_params(&params(&[("file", "a.md")]));
        let item = click.closest_class(FILE_ITEM_CLASS).unwrap();
        assert_eq!(item.data_value("file"), Some("a.md"));
        assert!(click.closest_id(FILE_LIST_ID).is_some());
        assert!(click.closest_id(THEME_TOGGLE_ID).is_none());
    }

    #[test]
    fn click_from_heading_param() {
        let click = ClickEvent::from_params(&params(&[("heading", "heading-0-intro")]));
        let item = click.closest_class(TOC_ITEM_CLASS).unwrap();
        assert_eq!(item.data_value("id"), Some("heading-0-intro"));
    }

    #[test]
    fn click_from_id_param() {
        let click = ClickEvent::from_params(&params(&[("id", THEME_TOGGLE_ID)]));
        assert!(click.closest_id(THEME_TOGGLE_ID).is_some());
        assert_eq!(click.origin().unwrap().id.as_deref(), Some(THEME_TOGGLE_ID));
    }

    #[test]
    fn unknown_params_click_nothing() {
        let click = ClickEvent::from_params(&params(&[("foo", "bar")]));
        assert!(click.origin().is_none());
    }

    #[test]
    fn closest_prefers_nearest_ancestor() {
        let click = ClickEvent::new(vec![
            Element::with_class("inner").data("k", "1"),
            Element::with_class("inner").data("k", "2"),
        ]);
        assert_eq!(
            click.closest_class("inner").unwrap().data_value("k"),
            Some("1")
        );
    }
}
