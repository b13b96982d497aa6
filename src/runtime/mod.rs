//! The declarative binding runtime.
//!
//! A [`Frontend`] owns a [`Page`], scans it for declarative attributes,
//! turns UI events into remote actions, presents their outcome and swaps
//! server-rendered fragments back into the page. It is single threaded:
//! build it and drive it from inside a `tokio::task::LocalSet`.

mod binder;
mod dispatch;
mod follow_up;
mod notify;
mod partial;
mod scheduler;
mod shell;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use kuchiki::NodeRef;
use serde_json::json;
use tracing::warn;

use crate::bus::{BusEvent, EventBus};
use crate::config::FrontendConfig;
use crate::dom::{Listener, NodeKey, Page};
use crate::net::{Backend, BackendError};
use crate::timers::{TimerId, TimerRegistry};

pub use dispatch::{parse_options, ElementOptions};
pub use follow_up::{
    BehaviorModule, FollowUp, FollowUpError, FollowUpTarget, ModuleRegistry, ReloadTargetHandler,
};
pub use notify::{NotificationMode, Outcome};
pub use scheduler::RenderingMode;
pub use shell::{LogShell, Shell};

/// The element that had focus before a partial reload, described so its
/// counterpart can be found in the freshly rendered fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusHandle {
    pub name: String,
    pub identity: String,
    pub target: String,
}

// Stable listener references; rebinding detaches and re-attaches these
// exact allocations.
struct Handlers {
    generic: Listener,
    drag_over: Listener,
    drag_start: Listener,
    focus: Listener,
    blur: Listener,
}

impl Handlers {
    fn new(me: &Weak<Frontend>) -> Self {
        fn bound(me: &Weak<Frontend>, handle: fn(&Frontend, &crate::dom::UiEvent, &NodeRef)) -> Listener {
            let me = me.clone();
            Rc::new(move |event, node| {
                if let Some(frontend) = me.upgrade() {
                    handle(&frontend, event, node);
                }
            })
        }

        Self {
            generic: bound(me, Frontend::handle_generic_event),
            drag_over: bound(me, Frontend::handle_drag_over),
            drag_start: bound(me, Frontend::handle_drag_start),
            focus: bound(me, Frontend::handle_focus),
            blur: bound(me, Frontend::handle_blur),
        }
    }
}

pub struct Frontend {
    me: Weak<Frontend>,
    page: Page,
    backend: Backend,
    config: FrontendConfig,
    bus: EventBus,
    modules: ModuleRegistry,
    shell: Rc<dyn Shell>,
    timers: TimerRegistry,
    handlers: Handlers,
    debounce: Cell<Option<TimerId>>,
    focus: RefCell<Option<FocusHandle>>,
    scheduled_fragments: RefCell<HashSet<String>>,
    observed: RefCell<HashMap<NodeKey, NodeRef>>,
    error_styles: RefCell<HashMap<NodeKey, (NodeRef, Option<String>)>>,
}

pub struct FrontendBuilder {
    page: Page,
    config: FrontendConfig,
    modules: ModuleRegistry,
    shell: Rc<dyn Shell>,
}

impl FrontendBuilder {
    pub fn module(mut self, name: impl Into<String>, module: Rc<dyn BehaviorModule>) -> Self {
        self.modules.register(name, module);
        self
    }

    pub fn shell(mut self, shell: Rc<dyn Shell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn build(self) -> Result<Rc<Frontend>, BackendError> {
        let backend = Backend::new(&self.config)?;
        Ok(Rc::new_cyclic(|me| Frontend {
            me: me.clone(),
            page: self.page,
            backend,
            config: self.config,
            bus: EventBus::new(),
            modules: self.modules,
            shell: self.shell,
            timers: TimerRegistry::new(),
            handlers: Handlers::new(me),
            debounce: Cell::new(None),
            focus: RefCell::new(None),
            scheduled_fragments: RefCell::new(HashSet::new()),
            observed: RefCell::new(HashMap::new()),
            error_styles: RefCell::new(HashMap::new()),
        }))
    }
}

impl Frontend {
    pub fn builder(page: Page, config: FrontendConfig) -> FrontendBuilder {
        FrontendBuilder {
            page,
            config,
            modules: ModuleRegistry::new(),
            shell: Rc::new(LogShell),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn focus_handle(&self) -> Option<FocusHandle> {
        self.focus.borrow().clone()
    }

    fn this(&self) -> Option<Rc<Frontend>> {
        self.me.upgrade()
    }

    /// Transport failures end here: the element falls back to its default
    /// value and an `error` bus event is raised.
    pub(crate) fn handle_network_error(&self, element: &NodeRef, err: &BackendError) {
        warn!(target: "backend", error = %err, "request failed");
        self.page.reset_value(element);
        self.bus
            .fire_event(BusEvent::Error, &json!({ "message": err.to_string() }));
    }
}
