use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use kuchiki::NodeRef;

use super::NodeKey;

/// An event listener. Receives the event and the node it is attached to.
pub type Listener = Rc<dyn Fn(&UiEvent, &NodeRef)>;

/// A UI event travelling through the page.
#[derive(Clone)]
pub struct UiEvent {
    kind: String,
    target: NodeRef,
    data_transfer: Rc<RefCell<Option<String>>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl UiEvent {
    pub fn new(kind: impl Into<String>, target: NodeRef) -> Self {
        Self {
            kind: kind.into(),
            target,
            data_transfer: Rc::new(RefCell::new(None)),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Attach a drag payload, as a drop event would carry it.
    pub fn with_data_transfer(self, payload: impl Into<String>) -> Self {
        *self.data_transfer.borrow_mut() = Some(payload.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    pub fn data_transfer(&self) -> Option<String> {
        self.data_transfer.borrow().clone()
    }

    pub fn set_data_transfer(&self, payload: String) {
        *self.data_transfer.borrow_mut() = Some(payload);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

impl fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiEvent")
            .field("kind", &self.kind)
            .field("default_prevented", &self.default_prevented.get())
            .field("propagation_stopped", &self.propagation_stopped.get())
            .finish()
    }
}

struct Binding {
    // Keeps the node alive so its key cannot be reused while bound.
    node: NodeRef,
    listeners: Vec<Listener>,
}

/// Listeners keyed by (element, event name).
///
/// Listener identity is the `Rc` allocation: adding a listener that is
/// already registered for the same pair is a no-op, and removal only
/// matches that same allocation.
#[derive(Default)]
pub struct ListenerRegistry {
    bindings: RefCell<HashMap<(NodeKey, String), Binding>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the listener was already attached.
    pub fn add(&self, node: &NodeRef, event: &str, listener: Listener) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        let binding = bindings
            .entry((NodeKey::of(node), event.to_string()))
            .or_insert_with(|| Binding {
                node: node.clone(),
                listeners: Vec::new(),
            });
        if binding
            .listeners
            .iter()
            .any(|existing| same_listener(existing, &listener))
        {
            return false;
        }
        binding.listeners.push(listener);
        true
    }

    pub fn remove(&self, node: &NodeRef, event: &str, listener: &Listener) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        let key = (NodeKey::of(node), event.to_string());
        let Some(binding) = bindings.get_mut(&key) else {
            return false;
        };
        let before = binding.listeners.len();
        binding
            .listeners
            .retain(|existing| !same_listener(existing, listener));
        let removed = binding.listeners.len() != before;
        if binding.listeners.is_empty() {
            bindings.remove(&key);
        }
        removed
    }

    pub fn contains(&self, node: &NodeRef, event: &str, listener: &Listener) -> bool {
        self.bindings
            .borrow()
            .get(&(NodeKey::of(node), event.to_string()))
            .map(|binding| {
                binding
                    .listeners
                    .iter()
                    .any(|existing| same_listener(existing, listener))
            })
            .unwrap_or(false)
    }

    pub fn count(&self, node: &NodeRef, event: &str) -> usize {
        self.bindings
            .borrow()
            .get(&(NodeKey::of(node), event.to_string()))
            .map(|binding| binding.listeners.len())
            .unwrap_or(0)
    }

    /// Snapshot, so listeners may mutate the registry while running.
    pub fn listeners_for(&self, node: &NodeRef, event: &str) -> Vec<Listener> {
        self.bindings
            .borrow()
            .get(&(NodeKey::of(node), event.to_string()))
            .map(|binding| binding.listeners.clone())
            .unwrap_or_default()
    }

    /// Drop every binding whose node no longer satisfies `keep`.
    pub fn retain(&self, keep: impl Fn(&NodeRef) -> bool) {
        self.bindings
            .borrow_mut()
            .retain(|_, binding| keep(&binding.node));
    }

    pub fn len(&self) -> usize {
        self.bindings
            .borrow()
            .values()
            .map(|binding| binding.listeners.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a) as *const (),
        Rc::as_ptr(b) as *const (),
    )
}
