use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Runtime-internal events other parts of an application can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEvent {
    Start,
    Success,
    Error,
    Reload,
}

impl BusEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusEvent::Start => "start",
            BusEvent::Success => "success",
            BusEvent::Error => "error",
            BusEvent::Reload => "reload",
        }
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type BusListener = Rc<dyn Fn(&Value)>;

/// Synchronous in-process publish/subscribe. Listeners run in registration
/// order.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<BusEvent, Vec<BusListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener(&self, event: BusEvent, listener: BusListener) {
        self.listeners
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(listener);
    }

    /// Removes that exact listener; returns whether it was registered.
    pub fn remove_event_listener(&self, event: BusEvent, listener: &BusListener) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(registered) = listeners.get_mut(&event) else {
            return false;
        };
        let position = registered.iter().position(|candidate| {
            std::ptr::eq(
                Rc::as_ptr(candidate) as *const (),
                Rc::as_ptr(listener) as *const (),
            )
        });
        match position {
            Some(index) => {
                registered.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn fire_event(&self, event: BusEvent, data: &Value) {
        let snapshot = self
            .listeners
            .borrow()
            .get(&event)
            .cloned()
            .unwrap_or_default();
        tracing::trace!(target: "bus", event = %event, listeners = snapshot.len(), "fire");
        for listener in snapshot {
            listener(data);
        }
    }
}
