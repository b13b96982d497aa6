use std::time::Duration;

use kuchiki::NodeRef;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use super::Frontend;
use crate::attrs;
use crate::bus::BusEvent;
use crate::dom::element::{attr, dataset, identity, is_form_field, split_list};
use crate::dom::UiEvent;
use crate::expr::{ExpressionError, Resolver};

const DEFAULT_ORDER_KEY: &str = "descending";

/// Per-element overrides read from the options attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementOptions {
    /// Debounce delay in milliseconds; zero dispatches immediately.
    #[serde(deserialize_with = "lenient_millis")]
    pub delay: Option<u64>,
    #[serde(deserialize_with = "lenient_flag")]
    pub prevent_default: Option<bool>,
    #[serde(deserialize_with = "lenient_flag")]
    pub stop_propagation: Option<bool>,
    #[serde(deserialize_with = "lenient_flag")]
    pub reset_value: Option<bool>,
}

// Options are hand-written markup: accept quoted numbers and booleans and
// ignore a field of the wrong shape instead of the whole object.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|ms| *ms >= 0.0).map(|ms| ms as u64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        Value::String(text) => match text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Malformed options are logged and replaced by the defaults.
pub fn parse_options(element: &NodeRef) -> ElementOptions {
    let Some(raw) = attr(element, attrs::OPTIONS) else {
        return ElementOptions::default();
    };
    match serde_json::from_str(&raw) {
        Ok(options) => options,
        Err(err) => {
            warn!(target: "dispatch", options = %raw, error = %err, "ignoring malformed element options");
            ElementOptions::default()
        }
    }
}

impl Frontend {
    /// Entry point for every bound UI event.
    ///
    /// Debounced dispatches share one timer across the whole runtime: a new
    /// debounced event cancels any still-pending one, whichever element
    /// scheduled it.
    pub fn handle_generic_event(&self, event: &UiEvent, element: &NodeRef) {
        let options = parse_options(element);
        if options.prevent_default.unwrap_or(true) {
            event.prevent_default();
        }
        if options.stop_propagation.unwrap_or(true) {
            event.stop_propagation();
        }

        let delay = options.delay.unwrap_or(0);
        if delay == 0 {
            self.do_handle_generic_event(event, element, options);
            return;
        }

        if let Some(pending) = self.debounce.take() {
            self.timers.clear_timer(pending);
        }
        let me = self.me.clone();
        let event = event.clone();
        let element = element.clone();
        let timer = self.timers.set_timeout(Duration::from_millis(delay), move || {
            if let Some(frontend) = me.upgrade() {
                frontend.debounce.set(None);
                frontend.do_handle_generic_event(&event, &element, options);
            }
        });
        self.debounce.set(Some(timer));
    }

    fn do_handle_generic_event(&self, event: &UiEvent, element: &NodeRef, options: ElementOptions) {
        if let Some(pagination) = self.pagination_target(element) {
            let Some(this) = self.this() else { return };
            let event = event.clone();
            let element = element.clone();
            tokio::task::spawn_local(async move {
                this.handle_pagination(&event, &element, pagination, &options)
                    .await;
            });
            return;
        }

        let Some(id) = identity(element) else {
            debug!(target: "dispatch", event = event.kind(), "element has no identity, nothing to invoke");
            return;
        };

        self.bus
            .fire_event(BusEvent::Start, &json!({ "id": id, "event": event.kind() }));

        let mut payload = match self.resolve_data(Some(event), element) {
            Ok(payload) => payload,
            Err(err) => {
                error!(target: "dispatch", %id, error = %err, "failed to build payload");
                return;
            }
        };
        payload.insert(
            attrs::EVENT_TYPE_PARAMETER.to_string(),
            Value::String(event.kind().to_string()),
        );

        let Some(this) = self.this() else { return };
        let element = element.clone();
        tokio::task::spawn_local(async move {
            this.invoke_remote(&element, &id, Value::Object(payload), &options)
                .await;
        });
    }

    /// Build the payload for an element: its own value when it is a named
    /// form field, then every declarative data attribute resolved.
    pub fn resolve_data(
        &self,
        event: Option<&UiEvent>,
        element: &NodeRef,
    ) -> Result<Map<String, Value>, ExpressionError> {
        let resolver = Resolver::new(&self.page);
        let mut data = Map::new();

        if let Some(name) = attr(element, "name").filter(|name| !name.is_empty()) {
            if is_form_field(element) {
                if let Some(value) = resolver.resolve_element_value(element) {
                    data.insert(name, value);
                }
            }
        }

        for (key, raw) in dataset(element) {
            if is_control_key(&key) {
                continue;
            }
            if let Some(value) = resolver.resolve_value(&raw, event, element)? {
                data.insert(key, value);
            }
        }
        Ok(data)
    }

    async fn invoke_remote(
        &self,
        element: &NodeRef,
        id: &str,
        payload: Value,
        options: &ElementOptions,
    ) {
        match self.backend.post_event(id, &payload).await {
            Ok(response) => {
                debug!(target: "dispatch", %id, status = response.status, status_text = %response.status_text, "remote action answered");
                self.handle_result(element, &response.json, response.status, options)
                    .await;
            }
            Err(err) => self.handle_network_error(element, &err),
        }
    }

    /// `key[, orderKey]` from the target attribute, when `key` names one of
    /// the element's own data attributes.
    fn pagination_target(&self, element: &NodeRef) -> Option<(String, String)> {
        let target = attr(element, attrs::TARGET)?;
        let mut parts = target.split(',').map(str::trim);
        let key = parts.next().filter(|key| !key.is_empty())?.to_string();
        let order_key = parts
            .next()
            .filter(|key| !key.is_empty())
            .unwrap_or(DEFAULT_ORDER_KEY)
            .to_string();
        dataset(element)
            .contains_key(&key)
            .then_some((key, order_key))
    }

    /// Local paging/sorting: compute the parameters and hand them to the
    /// result handler as if the backend had answered.
    async fn handle_pagination(
        &self,
        event: &UiEvent,
        element: &NodeRef,
        (key, order_key): (String, String),
        options: &ElementOptions,
    ) {
        let raw = dataset(element).remove(&key).unwrap_or_default();
        let value = match Resolver::new(&self.page).resolve_value(&raw, Some(event), element) {
            Ok(Some(Value::String(value))) => value,
            Ok(Some(Value::Null)) | Ok(None) => String::new(),
            Ok(Some(other)) => other.to_string(),
            Err(err) => {
                error!(target: "dispatch", %key, error = %err, "failed to resolve pagination value");
                return;
            }
        };

        let mut parameters = Map::new();
        parameters.insert(key.clone(), Value::String(value.clone()));

        let request_key = request_dataset_key(&key);
        let order_request_key = request_dataset_key(&order_key);
        for selector in attr(element, attrs::SUCCESS_TARGET)
            .map(|targets| split_list(&targets))
            .unwrap_or_default()
        {
            for container in self.page.select_all(&selector).unwrap_or_default() {
                let recorded = dataset(&container);
                if recorded.get(&request_key) == Some(&value) {
                    let current = recorded.get(&order_request_key).map(String::as_str);
                    let toggled = if current == Some("true") { "" } else { "true" };
                    parameters.insert(order_key.clone(), Value::String(toggled.to_string()));
                }
            }
        }

        debug!(target: "dispatch", ?parameters, "pagination");
        let result = json!({ "result": Value::Object(parameters) });
        self.handle_result(element, &result, 200, options).await;
    }
}

fn is_control_key(key: &str) -> bool {
    key.starts_with(attrs::DATASET_CONTROL_PREFIX)
        || key.starts_with(attrs::DATASET_REQUEST_PREFIX)
        || key == attrs::DATASET_ERROR
}

/// `page` → `requestPage`.
fn request_dataset_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!(
            "{}{}{}",
            attrs::DATASET_REQUEST_PREFIX,
            first.to_uppercase(),
            chars.as_str()
        ),
        None => attrs::DATASET_REQUEST_PREFIX.to_string(),
    }
}
