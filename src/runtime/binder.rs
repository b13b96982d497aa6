use std::rc::Rc;

use kuchiki::NodeRef;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{FocusHandle, Frontend, RenderingMode};
use crate::attrs;
use crate::dom::element::{attr, attr_list, dataset, has_attr, identity};
use crate::dom::{Listener, NodeKey, UiEvent};

impl Frontend {
    /// Scan the page and (re)attach everything its declarative attributes ask
    /// for. Safe to call any number of times: each listener is detached
    /// before it is attached again.
    pub fn bind_events(&self) {
        self.page.prune_detached();
        self.observed
            .borrow_mut()
            .retain(|_, node| self.page.contains(node));

        for element in self.page.elements_with_attr(attrs::RENDERING_MODE) {
            self.schedule_rendering(&element);
        }

        let mut bound = 0usize;
        for element in self.page.elements_with_attr(attrs::EVENTS) {
            for event in attr_list(&element, attrs::EVENTS) {
                let first_binding =
                    !self
                        .page
                        .listeners()
                        .contains(&element, &event, &self.handlers.generic);
                self.rebind(&element, &event, &self.handlers.generic);
                bound += 1;

                if event == "drop" {
                    self.rebind(&element, "dragover", &self.handlers.drag_over);
                }

                // The host's own load event may be long gone; emulate it once.
                if event == "load" && first_binding {
                    self.page.dispatch(&UiEvent::new("load", element.clone()));
                }
            }
        }

        for element in self.page.elements_where(|node| {
            has_attr(node, attrs::IDENTITY) && has_attr(node, attrs::TARGET) && has_attr(node, "name")
        }) {
            self.rebind(&element, "focus", &self.handlers.focus);
            self.rebind(&element, "blur", &self.handlers.blur);
        }

        for element in self.page.elements_with_attr(attrs::DRAGGABLE) {
            self.rebind(&element, "dragstart", &self.handlers.drag_start);
        }

        debug!(target: "binder", bound, "bound declarative events");
    }

    fn rebind(&self, element: &NodeRef, event: &str, listener: &Listener) {
        let listeners = self.page.listeners();
        listeners.remove(element, event, listener);
        listeners.add(element, event, Rc::clone(listener));
    }

    fn schedule_rendering(&self, element: &NodeRef) {
        let mode = attr(element, attrs::RENDERING_MODE)
            .map(|value| RenderingMode::parse(&value))
            .unwrap_or_default();
        let Some(id) = identity(element) else {
            warn!(target: "binder", ?mode, "rendering mode on an element without identity");
            return;
        };
        let delay_or_interval =
            attr(element, attrs::DELAY_OR_INTERVAL).and_then(|value| value.trim().parse().ok());

        // Visibility is observed per node; the other modes drive the
        // fragment once, however often it is re-rendered.
        let fresh = if mode == RenderingMode::Visible {
            self.observed
                .borrow_mut()
                .insert(NodeKey::of(element), element.clone())
                .is_none()
        } else {
            self.scheduled_fragments.borrow_mut().insert(id.clone())
        };
        if !fresh {
            return;
        }

        let me = self.me.clone();
        let callback = Rc::new(move || {
            if let Some(frontend) = me.upgrade() {
                frontend.refresh_fragment(&id);
            }
        });
        self.attach_rendering_handler(element, callback, mode, delay_or_interval);
    }

    pub(super) fn handle_drag_over(&self, event: &UiEvent, _element: &NodeRef) {
        event.prevent_default();
    }

    pub(super) fn handle_drag_start(&self, event: &UiEvent, element: &NodeRef) {
        let payload: serde_json::Map<String, Value> = dataset(element)
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        event.set_data_transfer(Value::Object(payload).to_string());
        trace!(target: "binder", "drag started");
    }

    pub(super) fn handle_focus(&self, _event: &UiEvent, element: &NodeRef) {
        let handle = (|| {
            Some(FocusHandle {
                name: attr(element, "name")?,
                identity: attr(element, attrs::IDENTITY)?,
                target: attr(element, attrs::TARGET)?,
            })
        })();
        self.page.focus(element);
        self.focus.replace(handle);
    }

    pub(super) fn handle_blur(&self, _event: &UiEvent, _element: &NodeRef) {
        self.focus.replace(None);
    }

    /// Move focus to the counterpart of the last focused element inside
    /// `fragment`, if there is one.
    pub(super) fn restore_focus(&self, fragment: &NodeRef) {
        let Some(handle) = self.focus_handle() else {
            return;
        };
        let counterpart = fragment.inclusive_descendants().find(|node| {
            attr(node, "name").as_deref() == Some(handle.name.as_str())
                && attr(node, attrs::IDENTITY).as_deref() == Some(handle.identity.as_str())
                && attr(node, attrs::TARGET).as_deref() == Some(handle.target.as_str())
        });
        if let Some(node) = counterpart {
            self.page.focus(&node);
        }
    }
}
