//! Declarative UI binding and partial-update runtime.
//!
//! Server-rendered markup carries `data-bind-*` attributes describing which
//! events to forward to the backend, how to present the outcome and which
//! fragments to re-render afterwards. [`Frontend`] interprets them against
//! a [`Page`].

pub mod attrs;
pub mod bus;
pub mod config;
pub mod dom;
pub mod expr;
pub mod net;
pub mod params;
pub mod runtime;
pub mod timers;

pub use bus::{BusEvent, BusListener, EventBus};
pub use config::{ConfigError, FrontendConfig};
pub use dom::{Page, UiEvent};
pub use net::{Backend, BackendError, RemoteResponse};
pub use runtime::{
    BehaviorModule, ElementOptions, FollowUp, FollowUpError, Frontend, FrontendBuilder,
    ModuleRegistry, ReloadTargetHandler, Shell,
};
