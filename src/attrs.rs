//! Names of the declarative attributes the runtime reads and writes.

pub const IDENTITY: &str = "data-bind-id";
pub const EVENTS: &str = "data-bind-events";
pub const OPTIONS: &str = "data-bind-options";
pub const TARGET: &str = "data-bind-target";

pub const SUCCESS_NOTIFICATIONS: &str = "data-bind-success-notifications";
pub const FAILURE_NOTIFICATIONS: &str = "data-bind-failure-notifications";
pub const SUCCESS_NOTIFICATIONS_SELECTOR: &str = "data-bind-success-notifications-selector";
pub const FAILURE_NOTIFICATIONS_SELECTOR: &str = "data-bind-failure-notifications-selector";
pub const SUCCESS_NOTIFICATIONS_PARTIAL: &str = "data-bind-success-notifications-partial";
pub const FAILURE_NOTIFICATIONS_PARTIAL: &str = "data-bind-failure-notifications-partial";

pub const SUCCESS_TARGET: &str = "data-bind-success-target";
pub const FAILURE_TARGET: &str = "data-bind-failure-target";

pub const RENDERING_MODE: &str = "data-bind-rendering-mode";
pub const DELAY_OR_INTERVAL: &str = "data-bind-delay-or-interval";

pub const REPEATER: &str = "data-bind-repeater";
pub const DRAGGABLE: &str = "data-bind-draggable";
pub const INLINE_MESSAGE: &str = "data-bind-inline-message";
pub const TEMPLATE: &str = "data-bind-template";
pub const ERROR: &str = "data-error";

/// Dataset keys (camel-cased `data-*` names) used by the parameter encoder.
pub const DATASET_CONTROL_PREFIX: &str = "bind";
pub const DATASET_REQUEST_PREFIX: &str = "request";
pub const DATASET_RENDER_STATE: &str = "bindRenderState";
pub const DATASET_CURRENT_OBJECT_ID: &str = "bindCurrentObjectId";
pub const DATASET_ERROR: &str = "error";

/// Query key the render-state token travels under.
pub const RENDER_STATE_PARAMETER: &str = "renderState";
/// Payload key the originating UI event type is stamped into.
pub const EVENT_TYPE_PARAMETER: &str = "htmlEvent";
