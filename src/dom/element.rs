use std::collections::BTreeMap;

use kuchiki::traits::*;
use kuchiki::NodeRef;

use crate::attrs;

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    attributes.get(name).map(str::to_string)
}

pub fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .map(|element| element.attributes.borrow().contains(name))
        .unwrap_or(false)
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let removed = element.attributes.borrow_mut().remove(name);
    removed.map(|attribute| attribute.value)
}

/// Lower-cased local tag name, `None` for non-element nodes.
pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.to_string().to_ascii_lowercase())
}

pub fn is_form_field(node: &NodeRef) -> bool {
    matches!(
        tag_name(node).as_deref(),
        Some("input") | Some("select") | Some("textarea")
    )
}

/// The `type` of an `<input>`, lower-cased, defaulting to `text`.
pub fn input_type(node: &NodeRef) -> Option<String> {
    if tag_name(node).as_deref() != Some("input") {
        return None;
    }
    Some(
        attr(node, "type")
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "text".to_string()),
    )
}

pub fn is_checkable(node: &NodeRef) -> bool {
    matches!(input_type(node).as_deref(), Some("checkbox") | Some("radio"))
}

/// Split a comma separated attribute into trimmed, non-empty entries.
pub fn attr_list(node: &NodeRef, name: &str) -> Vec<String> {
    attr(node, name)
        .map(|value| split_list(&value))
        .unwrap_or_default()
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_identity(value: &str) -> bool {
    value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// The element's identity token when it carries a well-formed one.
pub fn identity(node: &NodeRef) -> Option<String> {
    attr(node, attrs::IDENTITY).filter(|value| is_identity(value))
}

/// `data-*` attributes keyed the way a browser dataset keys them.
pub fn dataset(node: &NodeRef) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    let Some(element) = node.as_element() else {
        return collected;
    };
    let attributes = element.attributes.borrow();
    for (name, attribute) in attributes.map.iter() {
        if let Some(key) = dataset_key(&name.local) {
            collected.insert(key, attribute.value.clone());
        }
    }
    collected
}

/// `data-user-name` → `userName`; `None` for attributes outside the dataset.
pub fn dataset_key(attribute: &str) -> Option<String> {
    let rest = attribute.strip_prefix("data-")?;
    let mut key = String::with_capacity(rest.len());
    let mut upper = false;
    for c in rest.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            key.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            key.push(c);
        }
    }
    Some(key)
}

/// Parse an HTML fragment and return its first top-level element, detached.
pub fn first_element(html: &str) -> Option<NodeRef> {
    if html.trim().is_empty() {
        return None;
    }
    let document = kuchiki::parse_html().one(html);
    let body = document.select_first("body").ok()?;
    let element = body.as_node().children().elements().next()?;
    let node = element.as_node().clone();
    node.detach();
    Some(node)
}

/// Like [`first_element`], but parses `html` as the content of `context`,
/// so table rows, cells and options survive.
pub fn first_element_in(html: &str, context: Option<&NodeRef>) -> Option<NodeRef> {
    let Some(context) = context.and_then(|node| node.as_element()) else {
        return first_element(html);
    };
    if html.trim().is_empty() {
        return None;
    }
    let fragment = kuchiki::parse_fragment(context.name.clone(), Vec::new()).one(html);
    // html5ever wraps fragment content in a single <html> element.
    let wrapper = fragment.first_child()?;
    let node = wrapper.children().elements().next()?.as_node().clone();
    node.detach();
    Some(node)
}

pub fn is_descendant_of(node: &NodeRef, ancestor: &NodeRef) -> bool {
    node.ancestors().any(|candidate| &candidate == ancestor)
}
