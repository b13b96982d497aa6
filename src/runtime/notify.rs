use kuchiki::NodeRef;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ElementOptions, Frontend};
use crate::attrs;
use crate::bus::BusEvent;
use crate::dom::element::{attr, attr_list, dataset, first_element, remove_attr, set_attr};
use crate::dom::NodeKey;
use crate::expr::Resolver;

const ERROR_BORDER: &str = "border-color: #dc3545; border-width: 2px";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// `None` for statuses that are neither: those are ignored entirely.
    pub fn classify(status: u16) -> Option<Self> {
        match status {
            0..=299 => Some(Outcome::Success),
            400 | 401 | 403 | 404 | 405 | 422 | 500 | 503 => Some(Outcome::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationMode {
    #[default]
    None,
    SystemAlert,
    InlineTextMessage,
    CustomDialog,
    CustomDialogLinked,
}

impl NotificationMode {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "system-alert" => NotificationMode::SystemAlert,
            "inline-text-message" => NotificationMode::InlineTextMessage,
            "custom-dialog" => NotificationMode::CustomDialog,
            "custom-dialog-linked" => NotificationMode::CustomDialogLinked,
            _ => NotificationMode::None,
        }
    }
}

struct ModeAttributes {
    mode: &'static str,
    selector: &'static str,
    partial: &'static str,
}

fn mode_attributes(outcome: Outcome) -> ModeAttributes {
    match outcome {
        Outcome::Success => ModeAttributes {
            mode: attrs::SUCCESS_NOTIFICATIONS,
            selector: attrs::SUCCESS_NOTIFICATIONS_SELECTOR,
            partial: attrs::SUCCESS_NOTIFICATIONS_PARTIAL,
        },
        Outcome::Failure => ModeAttributes {
            mode: attrs::FAILURE_NOTIFICATIONS,
            selector: attrs::FAILURE_NOTIFICATIONS_SELECTOR,
            partial: attrs::FAILURE_NOTIFICATIONS_PARTIAL,
        },
    }
}

fn message_text(outcome: Outcome, status: u16, json: &Value) -> String {
    let base = match outcome {
        Outcome::Success => "✅ Operation successful.".to_string(),
        Outcome::Failure => format!("❌ Operation failed with status {status}"),
    };
    match json.get("message").and_then(Value::as_str) {
        Some(message) if !message.is_empty() => format!("{base} {message}"),
        _ => base,
    }
}

impl Frontend {
    /// Classify a backend answer, present it and run the follow-up actions.
    pub async fn handle_result(
        &self,
        element: &NodeRef,
        json: &Value,
        status: u16,
        options: &ElementOptions,
    ) {
        let Some(outcome) = Outcome::classify(status) else {
            warn!(target: "result", status, "ignoring unrecognized status");
            return;
        };

        let event = match outcome {
            Outcome::Success => BusEvent::Success,
            Outcome::Failure => BusEvent::Error,
        };
        self.bus.fire_event(event, json);

        self.handle_notifications(element, json, status, outcome);

        let parameters = json.get("result").cloned().unwrap_or(Value::Null);
        self.process_follow_up_actions(element, &parameters, status, options)
            .await;

        if options.reset_value == Some(true) {
            self.page.reset_value(element);
        }
    }

    fn handle_notifications(&self, element: &NodeRef, json: &Value, status: u16, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.clear_error_markers(),
            Outcome::Failure => {
                self.clear_error_markers();
                self.mark_field_errors(element, json);
            }
        }

        let names = mode_attributes(outcome);
        let mode = attr(element, names.mode)
            .map(|value| NotificationMode::parse(&value))
            .unwrap_or_default();
        debug!(target: "result", ?outcome, ?mode, status, "presenting result");

        match mode {
            NotificationMode::None => {}
            NotificationMode::SystemAlert => {
                self.shell.alert(&message_text(outcome, status, json));
            }
            NotificationMode::InlineTextMessage => {
                self.show_inline_message(element, &message_text(outcome, status, json));
            }
            NotificationMode::CustomDialog => {
                let targets = attr_list(element, names.selector)
                    .iter()
                    .flat_map(|selector| self.page.select_all(selector).unwrap_or_default())
                    .collect();
                self.reveal(targets);
            }
            NotificationMode::CustomDialogLinked => {
                let identities = attr_list(element, names.partial);
                let targets = self.page.elements_where(|node| {
                    attr(node, attrs::IDENTITY)
                        .map(|id| identities.contains(&id))
                        .unwrap_or(false)
                });
                self.reveal(targets);
            }
        }
    }

    fn show_inline_message(&self, element: &NodeRef, text: &str) {
        for stale in self.page.elements_with_attr(attrs::INLINE_MESSAGE) {
            stale.detach();
        }
        let html = format!(
            "<span {}>{}</span>",
            attrs::INLINE_MESSAGE,
            html_escape::encode_text(text)
        );
        let Some(message) = first_element(&html) else {
            return;
        };
        element.insert_after(message.clone());
        self.timers
            .set_timeout(self.config.message_timeout(), move || message.detach());
    }

    fn reveal(&self, targets: Vec<NodeRef>) {
        if targets.is_empty() {
            warn!(target: "result", "custom dialog has nothing to reveal");
            return;
        }
        for target in &targets {
            remove_attr(target, "hidden");
        }
        self.timers.set_timeout(self.config.dialog_timeout(), move || {
            for target in &targets {
                set_attr(target, "hidden", "");
            }
        });
    }

    /// Mark the inputs behind each reported field error. The input is found
    /// through the element's data attribute for that property, falling back
    /// to a field with the property's name.
    fn mark_field_errors(&self, element: &NodeRef, json: &Value) {
        let Some(errors) = json.get("errors").and_then(Value::as_array) else {
            return;
        };
        let mappings = dataset(element);
        let resolver = Resolver::new(&self.page);

        for error in errors {
            let Some(property) = error.get("property").and_then(Value::as_str) else {
                continue;
            };
            let token = error
                .get("token")
                .and_then(Value::as_str)
                .unwrap_or("invalid");
            let expression = mappings
                .get(property)
                .cloned()
                .unwrap_or_else(|| format!("name({property})"));
            for input in resolver.resolve_elements(&expression, element) {
                self.mark_error(&input, token);
            }
        }
    }

    fn mark_error(&self, input: &NodeRef, token: &str) {
        let previous = {
            let mut styles = self.error_styles.borrow_mut();
            let (_, previous) = styles
                .entry(NodeKey::of(input))
                .or_insert_with(|| (input.clone(), attr(input, "style")));
            previous.clone()
        };
        let style = match previous.as_deref().map(str::trim) {
            Some(existing) if !existing.is_empty() => {
                format!("{}; {ERROR_BORDER}", existing.trim_end_matches(';'))
            }
            _ => ERROR_BORDER.to_string(),
        };
        set_attr(input, "style", &style);
        set_attr(input, attrs::ERROR, token);
    }

    /// Restore every element still carrying an error marker, not only the
    /// ones touched by the latest response.
    fn clear_error_markers(&self) {
        let mut styles = self.error_styles.borrow_mut();
        for node in self.page.elements_with_attr(attrs::ERROR) {
            remove_attr(&node, attrs::ERROR);
            if let Some((_, previous)) = styles.remove(&NodeKey::of(&node)) {
                match previous {
                    Some(style) => set_attr(&node, "style", &style),
                    None => {
                        remove_attr(&node, "style");
                    }
                }
            }
        }
        styles.retain(|_, (node, _)| self.page.contains(node));
    }
}
