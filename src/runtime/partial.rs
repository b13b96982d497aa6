use std::time::Duration;

use kuchiki::NodeRef;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::Frontend;
use crate::attrs;
use crate::bus::BusEvent;
use crate::dom::element::{attr, dataset, first_element_in, identity, set_attr};
use crate::params::{encode_request_parameters, overrides_from};

/// Attribute lookup derived from the tail of a selector: `div#main` →
/// (`id`, `main`), `.row.active` → (`class`, `active`).
fn selector_lookup(selector: &str) -> Option<(&'static str, &str)> {
    let tail = selector.trim().rsplit(char::is_whitespace).next()?;
    let position = tail.rfind(&['#', '.'][..])?;
    let value = &tail[position + 1..];
    if value.is_empty() {
        return None;
    }
    let key = if tail[position..].starts_with('#') { "id" } else { "class" };
    Some((key, value))
}

impl Frontend {
    /// Re-render every container matching `selector`. `parameters` (a result
    /// object) override the containers' own request parameters.
    pub async fn reload_partial(
        &self,
        selector: &str,
        parameters: Option<&Value>,
        element: &NodeRef,
        skip_rebind: bool,
    ) {
        let Some(containers) = self.page.select_all(selector) else {
            warn!(target: "partial", %selector, "invalid selector");
            return;
        };
        if containers.is_empty() {
            warn!(target: "partial", %selector, "no elements to reload");
            return;
        }

        for container in containers {
            let id = match identity(&container) {
                Some(id) => id,
                None => match self.derive_identity(selector, element).await {
                    Some(id) => id,
                    None => {
                        debug!(target: "partial", %selector, "could not derive an identity");
                        continue;
                    }
                },
            };
            self.replace_partial(&container, &id, parameters, element, skip_rebind)
                .await;
        }
    }

    // Best-effort fallback for containers rendered without an identity.
    async fn derive_identity(&self, selector: &str, element: &NodeRef) -> Option<String> {
        let (key, value) = selector_lookup(selector)?;
        match self.backend.lookup_identity(key, value).await {
            Ok(found) => found,
            Err(err) => {
                self.handle_network_error(element, &err);
                None
            }
        }
    }

    /// Fetch the server rendering of `id` and swap it in for `container`.
    pub async fn replace_partial(
        &self,
        container: &NodeRef,
        id: &str,
        parameters: Option<&Value>,
        element: &NodeRef,
        skip_rebind: bool,
    ) {
        let suffix = encode_request_parameters(&dataset(container), &overrides_from(parameters));
        debug!(target: "partial", %id, %suffix, "reloading");
        match self.backend.fetch_html(id, &suffix).await {
            Ok(html) => {
                let replacement = self.swap(container, &html);
                self.bus.fire_event(BusEvent::Reload, &json!({ "id": id }));
                self.settle(replacement.as_ref(), skip_rebind);
            }
            Err(err) => self.handle_network_error(element, &err),
        }
    }

    /// Same fetch/replace/rebind sequence against an explicit URI.
    pub async fn load_partial(&self, uri: &str, container: &NodeRef) {
        match self.backend.fetch_uri(uri).await {
            Ok(html) => {
                let replacement = self.swap(container, &html);
                self.bus.fire_event(BusEvent::Reload, &json!({ "uri": uri }));
                self.settle(replacement.as_ref(), false);
            }
            Err(err) => self.handle_network_error(container, &err),
        }
    }

    /// Render template `template_id` with `{status, data}` into the first
    /// element matching `selector`, replacing an earlier instance of the same
    /// template. The fragment removes itself after `timeout` (the configured
    /// template timeout when `None`).
    pub async fn instantiate_template(
        &self,
        selector: &str,
        template_id: &str,
        status: u16,
        data: &Value,
        timeout: Option<Duration>,
    ) {
        let Some(container) = self.page.select_first(selector) else {
            warn!(target: "partial", %selector, "no container for template");
            return;
        };

        let html = match self.backend.render_template(template_id, status, data).await {
            Ok(html) => html,
            Err(err) => {
                self.handle_network_error(&container, &err);
                return;
            }
        };

        for stale in self
            .page
            .elements_where(|node| attr(node, attrs::TEMPLATE).as_deref() == Some(template_id))
        {
            stale.detach();
        }

        let Some(fragment) = first_element_in(&html, Some(&container)) else {
            debug!(target: "partial", %template_id, "template rendered empty");
            return;
        };
        set_attr(&fragment, attrs::TEMPLATE, template_id);
        container.append(fragment.clone());
        self.bind_events();

        let timeout = timeout.unwrap_or_else(|| self.config.template_timeout());
        self.timers.set_timeout(timeout, move || fragment.detach());
    }

    /// Re-render a fragment by identity; used by the rendering modes.
    pub(super) fn refresh_fragment(&self, id: &str) {
        let Some(container) = self
            .page
            .elements_where(|node| attr(node, attrs::IDENTITY).as_deref() == Some(id))
            .into_iter()
            .next()
        else {
            debug!(target: "partial", %id, "fragment left the page");
            return;
        };
        let Some(this) = self.this() else { return };
        let id = id.to_string();
        tokio::task::spawn_local(async move {
            this.replace_partial(&container, &id, None, &container, false)
                .await;
        });
    }

    /// Replace `container` with the first element of `html`, or remove it
    /// when the rendering is empty. `html` is parsed in the context of the
    /// container's parent.
    fn swap(&self, container: &NodeRef, html: &str) -> Option<NodeRef> {
        let replacement = first_element_in(html, container.parent().as_ref());
        if let Some(replacement) = &replacement {
            container.insert_before(replacement.clone());
        }
        container.detach();
        replacement
    }

    fn settle(&self, replacement: Option<&NodeRef>, skip_rebind: bool) {
        if let Some(replacement) = replacement {
            self.restore_focus(replacement);
        }
        if !skip_rebind {
            self.bind_events();
        }
    }
}
