use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::attrs;

/// Characters left unescaped by a browser's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build the path suffix and query for a partial render of an element.
///
/// Starts from `/<currentObjectId>` when the element names one, collects its
/// `data-request-*` attributes (prefix stripped, first letter lower-cased),
/// adds the render-state token and finally applies `overrides`, where an
/// empty string removes a key.
pub fn encode_request_parameters(
    dataset: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> String {
    let prefix = dataset
        .get(attrs::DATASET_CURRENT_OBJECT_ID)
        .filter(|id| !id.is_empty())
        .map(|id| format!("/{id}"))
        .unwrap_or_default();

    let mut parameters: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in dataset {
        if let Some(name) = request_parameter_name(key) {
            parameters.insert(name, value.clone());
        }
    }

    if let Some(state) = dataset.get(attrs::DATASET_RENDER_STATE) {
        parameters.insert(attrs::RENDER_STATE_PARAMETER.to_string(), state.clone());
    }

    for (key, value) in overrides {
        if value.is_empty() {
            parameters.remove(key);
        } else {
            parameters.insert(key.clone(), value.clone());
        }
    }

    if parameters.is_empty() {
        return prefix;
    }

    let query = parameters
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT),
                utf8_percent_encode(value, COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{prefix}?{query}")
}

/// `requestSortKey` → `sortKey`.
fn request_parameter_name(key: &str) -> Option<String> {
    let rest = key.strip_prefix(attrs::DATASET_REQUEST_PREFIX)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

/// Flatten a result object into string overrides. `null` maps to the empty
/// string, which removes the key.
pub fn overrides_from(parameters: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = parameters else {
        return BTreeMap::new();
    };
    overrides_from_map(map)
}

fn overrides_from_map(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
