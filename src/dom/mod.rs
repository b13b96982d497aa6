pub mod element;
mod listeners;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use kuchiki::traits::*;
use kuchiki::NodeRef;

pub use listeners::{Listener, ListenerRegistry, UiEvent};

use element::{attr, has_attr, input_type, tag_name};

/// Stable key for a live node, derived from its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &NodeRef) -> Self {
        NodeKey(Rc::as_ptr(&node.0) as usize)
    }
}

#[derive(Default)]
struct FieldState {
    value: Option<String>,
    checked: Option<bool>,
    selected: Option<Vec<String>>,
}

struct TrackedField {
    node: NodeRef,
    state: FieldState,
}

struct VisibilityWatch {
    node: NodeRef,
    callback: Rc<dyn Fn()>,
    visible: Cell<bool>,
}

/// The document the runtime binds to.
///
/// Attributes hold the server-rendered defaults; live form values are kept
/// in an overlay so resetting a field restores what the server rendered.
pub struct Page {
    document: NodeRef,
    listeners: ListenerRegistry,
    fields: RefCell<HashMap<NodeKey, TrackedField>>,
    focused: RefCell<Option<NodeRef>>,
    watches: RefCell<Vec<VisibilityWatch>>,
}

impl Page {
    pub fn from_html(html: &str) -> Self {
        Self::new(kuchiki::parse_html().one(html))
    }

    pub fn new(document: NodeRef) -> Self {
        Self {
            document,
            listeners: ListenerRegistry::new(),
            fields: RefCell::new(HashMap::new()),
            focused: RefCell::new(None),
            watches: RefCell::new(Vec::new()),
        }
    }

    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        node.inclusive_ancestors()
            .last()
            .map(|root| root == self.document)
            .unwrap_or(false)
    }

    /// All elements matching a CSS selector, in document order.
    pub fn select_all(&self, selector: &str) -> Option<Vec<NodeRef>> {
        let matches = self.document.select(selector).ok()?;
        Some(matches.map(|element| element.as_node().clone()).collect())
    }

    pub fn select_first(&self, selector: &str) -> Option<NodeRef> {
        self.select_all(selector)?.into_iter().next()
    }

    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeRef> {
        self.document
            .inclusive_descendants()
            .elements()
            .map(|element| element.as_node().clone())
            .filter(|node| has_attr(node, name))
            .collect()
    }

    pub fn elements_where(&self, predicate: impl Fn(&NodeRef) -> bool) -> Vec<NodeRef> {
        self.document
            .inclusive_descendants()
            .elements()
            .map(|element| element.as_node().clone())
            .filter(|node| predicate(node))
            .collect()
    }

    /// Deliver an event to the target and then to its ancestors until a
    /// listener stops propagation.
    pub fn dispatch(&self, event: &UiEvent) {
        for node in event.target().inclusive_ancestors() {
            for listener in self.listeners.listeners_for(&node, event.kind()) {
                listener(event, &node);
            }
            if event.propagation_stopped() {
                break;
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut bytes = Vec::new();
        if self.document.serialize(&mut bytes).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Forget listeners, form state and watches of nodes that left the document.
    pub fn prune_detached(&self) {
        self.listeners.retain(|node| self.contains(node));
        self.fields
            .borrow_mut()
            .retain(|_, tracked| self.contains(&tracked.node));
        self.watches
            .borrow_mut()
            .retain(|watch| self.contains(&watch.node));
        let stale = self
            .focused
            .borrow()
            .as_ref()
            .map(|node| !self.contains(node))
            .unwrap_or(false);
        if stale {
            self.focused.replace(None);
        }
    }

    pub fn focus(&self, node: &NodeRef) {
        self.focused.replace(Some(node.clone()));
    }

    pub fn focused(&self) -> Option<NodeRef> {
        self.focused.borrow().clone()
    }

    pub fn value(&self, node: &NodeRef) -> String {
        if let Some(value) = self.with_field(node, |state| state.value.clone()) {
            return value;
        }
        match tag_name(node).as_deref() {
            Some("textarea") => node.text_contents(),
            Some("select") => self.selected_values(node).into_iter().next().unwrap_or_default(),
            Some("input") => attr(node, "value").unwrap_or_else(|| {
                if element::is_checkable(node) {
                    "on".to_string()
                } else {
                    String::new()
                }
            }),
            _ => attr(node, "value").unwrap_or_default(),
        }
    }

    pub fn set_value(&self, node: &NodeRef, value: impl Into<String>) {
        let value = value.into();
        self.update_field(node, |state| state.value = Some(value));
    }

    pub fn checked(&self, node: &NodeRef) -> bool {
        self.with_field(node, |state| state.checked)
            .unwrap_or_else(|| has_attr(node, "checked"))
    }

    pub fn set_checked(&self, node: &NodeRef, checked: bool) {
        if checked && input_type(node).as_deref() == Some("radio") {
            if let Some(name) = attr(node, "name") {
                let group = self.elements_where(|other| {
                    other != node
                        && input_type(other).as_deref() == Some("radio")
                        && attr(other, "name").as_deref() == Some(name.as_str())
                });
                for other in group {
                    self.update_field(&other, |state| state.checked = Some(false));
                }
            }
        }
        self.update_field(node, |state| state.checked = Some(checked));
    }

    pub fn is_multiple(&self, node: &NodeRef) -> bool {
        tag_name(node).as_deref() == Some("select") && has_attr(node, "multiple")
    }

    /// Values of the selected `<option>`s of a `<select>`.
    pub fn selected_values(&self, node: &NodeRef) -> Vec<String> {
        if let Some(selected) = self.with_field(node, |state| state.selected.clone()) {
            return selected;
        }
        let options: Vec<NodeRef> = node
            .descendants()
            .elements()
            .filter(|element| &*element.name.local == "option")
            .map(|element| element.as_node().clone())
            .collect();
        let selected: Vec<String> = options
            .iter()
            .filter(|option| has_attr(option, "selected"))
            .map(option_value)
            .collect();
        if selected.is_empty() && !self.is_multiple(node) {
            return options.first().map(option_value).into_iter().collect();
        }
        selected
    }

    pub fn select_values(&self, node: &NodeRef, values: &[&str]) {
        let selected = values.iter().map(|value| value.to_string()).collect();
        self.update_field(node, |state| state.selected = Some(selected));
    }

    /// Restore the server-rendered default of a form field.
    pub fn reset_value(&self, node: &NodeRef) {
        self.fields.borrow_mut().remove(&NodeKey::of(node));
    }

    pub fn observe_visibility(&self, node: &NodeRef, callback: Rc<dyn Fn()>) {
        self.watches.borrow_mut().push(VisibilityWatch {
            node: node.clone(),
            callback,
            visible: Cell::new(false),
        });
    }

    /// Report a viewport intersection change; watchers run on every
    /// hidden → visible transition.
    pub fn set_visible(&self, node: &NodeRef, visible: bool) {
        let triggered: Vec<Rc<dyn Fn()>> = self
            .watches
            .borrow()
            .iter()
            .filter(|watch| &watch.node == node)
            .filter_map(|watch| {
                let was_visible = watch.visible.replace(visible);
                (visible && !was_visible).then(|| Rc::clone(&watch.callback))
            })
            .collect();
        for callback in triggered {
            callback();
        }
    }

    fn with_field<T>(&self, node: &NodeRef, read: impl FnOnce(&FieldState) -> Option<T>) -> Option<T> {
        self.fields
            .borrow()
            .get(&NodeKey::of(node))
            .and_then(|tracked| read(&tracked.state))
    }

    fn update_field(&self, node: &NodeRef, write: impl FnOnce(&mut FieldState)) {
        let mut fields = self.fields.borrow_mut();
        let tracked = fields.entry(NodeKey::of(node)).or_insert_with(|| TrackedField {
            node: node.clone(),
            state: FieldState::default(),
        });
        write(&mut tracked.state);
    }
}

fn option_value(option: &NodeRef) -> String {
    attr(option, "value").unwrap_or_else(|| option.text_contents().trim().to_string())
}
