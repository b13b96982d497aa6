use std::rc::Rc;
use std::time::Duration;

use kuchiki::NodeRef;
use tracing::debug;

use super::Frontend;

const DEFAULT_DELAY_MS: u64 = 1_000;
const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// When a fragment refreshes itself without a user event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingMode {
    #[default]
    Load,
    Delayed,
    Visible,
    Periodic,
}

impl RenderingMode {
    /// Unrecognized modes behave like `load`.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "delayed" => RenderingMode::Delayed,
            "visible" => RenderingMode::Visible,
            "periodic" => RenderingMode::Periodic,
            _ => RenderingMode::Load,
        }
    }
}

impl Frontend {
    pub fn attach_rendering_handler(
        &self,
        element: &NodeRef,
        callback: Rc<dyn Fn()>,
        mode: RenderingMode,
        delay_or_interval: Option<u64>,
    ) {
        debug!(target: "scheduler", ?mode, ?delay_or_interval, "attaching rendering handler");
        match mode {
            RenderingMode::Load => callback(),
            RenderingMode::Delayed => {
                let delay = Duration::from_millis(delay_or_interval.unwrap_or(DEFAULT_DELAY_MS));
                self.timers.set_timeout(delay, move || callback());
            }
            RenderingMode::Visible => self.page.observe_visibility(element, callback),
            RenderingMode::Periodic => {
                callback();
                let period =
                    Duration::from_millis(delay_or_interval.unwrap_or(DEFAULT_INTERVAL_MS));
                self.timers.set_interval(period, move || callback());
            }
        }
    }
}
