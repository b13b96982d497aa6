//! The value-expression grammar used inside declarative attributes.
//!
//! ```text
//! json(<json>)     literal JSON value
//! data(<ignored>)  the JSON drag payload of the current drop
//! css(<selector>)  elements matching a CSS selector
//! name(<name>)     form fields with that name
//! id(<identity>)   elements carrying that identity token
//! anything else    opaque literal
//! ```

use kuchiki::NodeRef;
use serde_json::Value;
use thiserror::Error;

use crate::attrs;
use crate::dom::element::{attr, is_checkable, is_descendant_of, is_form_field};
use crate::dom::{Page, UiEvent};

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("invalid JSON literal in '{raw}': {source}")]
    InvalidJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid drag payload: {0}")]
    InvalidDragPayload(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Css,
    Name,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueExpression<'a> {
    Literal(&'a str),
    Json(&'a str),
    DragPayload,
    Element { kind: RefKind, value: &'a str },
}

impl<'a> ValueExpression<'a> {
    pub fn parse(raw: &'a str) -> Self {
        if let Some(body) = wrapped(raw, "json") {
            return ValueExpression::Json(body);
        }
        if wrapped(raw, "data").is_some() {
            return ValueExpression::DragPayload;
        }
        Self::parse_reference(raw)
    }

    /// Parse ignoring the JSON and drag-payload forms.
    pub fn parse_reference(raw: &'a str) -> Self {
        let reference = [("css", RefKind::Css), ("name", RefKind::Name), ("id", RefKind::Id)]
            .into_iter()
            .find_map(|(tag, kind)| wrapped(raw, tag).map(|value| (kind, value)));
        match reference {
            Some((kind, value)) => ValueExpression::Element { kind, value },
            None => ValueExpression::Literal(raw),
        }
    }
}

fn wrapped<'a>(raw: &'a str, tag: &str) -> Option<&'a str> {
    raw.strip_prefix(tag)?.strip_prefix('(')?.strip_suffix(')')
}

/// Evaluates value expressions against a page.
pub struct Resolver<'p> {
    page: &'p Page,
}

impl<'p> Resolver<'p> {
    pub fn new(page: &'p Page) -> Self {
        Self { page }
    }

    /// Resolve one attribute value. `Ok(None)` stands for "undefined": the
    /// key is left out of the payload.
    pub fn resolve_value(
        &self,
        raw: &str,
        event: Option<&UiEvent>,
        element: &NodeRef,
    ) -> Result<Option<Value>, ExpressionError> {
        match ValueExpression::parse(raw) {
            ValueExpression::Json(body) => serde_json::from_str(body)
                .map(Some)
                .map_err(|source| ExpressionError::InvalidJson {
                    raw: raw.to_string(),
                    source,
                }),
            ValueExpression::DragPayload => {
                match event.and_then(UiEvent::data_transfer) {
                    Some(payload) => serde_json::from_str(&payload)
                        .map(Some)
                        .map_err(ExpressionError::InvalidDragPayload),
                    None => Ok(self.resolve_reference(raw, element)),
                }
            }
            _ => Ok(self.resolve_reference(raw, element)),
        }
    }

    fn resolve_reference(&self, raw: &str, element: &NodeRef) -> Option<Value> {
        let matches = self.resolve_elements(raw, element);
        match matches.len() {
            0 => Some(Value::String(raw.to_string())),
            1 => self.resolve_element_value(&matches[0]),
            _ => Some(Value::Array(
                matches
                    .iter()
                    .map(|node| self.resolve_element_value(node).unwrap_or(Value::Null))
                    .collect(),
            )),
        }
    }

    /// Elements an expression refers to, narrowed to the triggering
    /// element's repeater instance when that still leaves a match.
    pub fn resolve_elements(&self, raw: &str, element: &NodeRef) -> Vec<NodeRef> {
        let found = match ValueExpression::parse_reference(raw) {
            ValueExpression::Element {
                kind: RefKind::Css,
                value,
            } => self.page.select_all(value).unwrap_or_default(),
            ValueExpression::Element {
                kind: RefKind::Name,
                value,
            } => self.page.elements_where(|node| {
                is_form_field(node) && attr(node, "name").as_deref() == Some(value)
            }),
            ValueExpression::Element {
                kind: RefKind::Id,
                value,
            } => self
                .page
                .elements_where(|node| attr(node, attrs::IDENTITY).as_deref() == Some(value)),
            _ => Vec::new(),
        };

        if found.len() < 2 {
            return found;
        }
        let Some(repeater) = element
            .inclusive_ancestors()
            .find(|node| crate::dom::element::has_attr(node, attrs::REPEATER))
        else {
            return found;
        };
        let local: Vec<NodeRef> = found
            .iter()
            .filter(|node| is_descendant_of(node, &repeater))
            .cloned()
            .collect();
        if local.is_empty() {
            found
        } else {
            local
        }
    }

    /// Reduce a form field to the scalar it contributes to a payload.
    pub fn resolve_element_value(&self, node: &NodeRef) -> Option<Value> {
        if is_checkable(node) {
            let checked = self.page.checked(node);
            return match attr(node, "value") {
                Some(value) if checked => Some(Value::String(value)),
                Some(_) => None,
                None => Some(Value::Bool(checked)),
            };
        }
        if self.page.is_multiple(node) {
            return Some(Value::Array(
                self.page
                    .selected_values(node)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ));
        }
        let value = self.page.value(node);
        if value.is_empty() {
            Some(Value::Null)
        } else {
            Some(Value::String(value))
        }
    }
}
