mod common;

use std::time::Duration;

use axum::http::Method;
use frontend_bind::{BusEvent, UiEvent};
use serde_json::json;
use tokio::task::LocalSet;

use common::*;

fn panel(value: &str) -> String {
    format!(
        r#"<div id="panel" data-bind-id="{PANEL_ID}">
             <input name="q" value="{value}" data-bind-id="{INPUT_ID}"
                    data-bind-target="{PANEL_ID}" data-bind-events="change">
           </div>"#
    )
}

#[tokio::test]
async fn reload_swaps_rebinds_and_restores_focus() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, &panel("fresh"));
            let frontend = frontend(&panel("stale"), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();
            let page = frontend.page();

            let old_input = page.select_first("input[name=q]").unwrap();
            page.dispatch(&UiEvent::new("focus", old_input.clone()));
            assert!(frontend.focus_handle().is_some());

            frontend
                .reload_partial("#panel", None, &old_input, false)
                .await;

            assert_eq!(reloads.borrow().as_slice(), &[json!({ "id": PANEL_ID })]);
            assert!(!page.contains(&old_input));
            let new_input = page.select_first("input[name=q]").unwrap();
            assert_eq!(page.value(&new_input), "fresh");
            assert_eq!(page.focused(), Some(new_input.clone()));
            assert_eq!(page.listeners().count(&new_input, "change"), 1);
            assert_eq!(page.listeners().count(&new_input, "focus"), 1);
        })
        .await;
}

#[tokio::test]
async fn request_state_travels_in_path_and_query() {
    let html = format!(
        r#"<section id="orders" data-bind-id="{LIST_ID}"
                    data-bind-current-object-id="order-7"
                    data-bind-render-state="tab=2&amp;open"
                    data-request-sort-key="date"
                    data-request-page="3"></section>"#
    );
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(LIST_ID, &format!(r#"<section data-bind-id="{LIST_ID}"></section>"#));
            let frontend = frontend(&html, backend.config());
            let page = frontend.page();
            let container = page.select_first("#orders").unwrap();

            let result = json!({ "page": null, "filter": "open orders" });
            frontend
                .reload_partial("#orders", Some(&result), &container, true)
                .await;

            let fetches = backend.requests_to(Method::GET, "/html/");
            assert_eq!(fetches.len(), 1);
            assert_eq!(fetches[0].path, format!("/html/{LIST_ID}/order-7"));
            assert_eq!(
                fetches[0].query.as_deref(),
                Some("filter=open%20orders&renderState=tab%3D2%26open&sortKey=date")
            );
        })
        .await;
}

#[tokio::test]
async fn container_without_identity_is_looked_up() {
    let html = r#"<div id="sidebar">old</div>"#;
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.register_identity("sidebar", LIST_ID);
            backend.serve_fragment(LIST_ID, r#"<div id="sidebar">new</div>"#);
            let frontend = frontend(html, backend.config());
            let page = frontend.page();
            let container = page.select_first("#sidebar").unwrap();

            frontend
                .reload_partial("div#sidebar", None, &container, false)
                .await;

            let lookups = backend.requests_to(Method::GET, "/rest/DOMElement");
            assert_eq!(lookups[0].query.as_deref(), Some("id=sidebar"));
            assert!(page.to_html().contains("new"));
        })
        .await;
}

#[tokio::test]
async fn missing_containers_are_a_no_op() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            let frontend = frontend("<p id=\"x\">x</p>", backend.config());
            let element = frontend.page().select_first("#x").unwrap();
            frontend.reload_partial("#nowhere", None, &element, false).await;
            frontend.reload_partial("[[", None, &element, false).await;
            assert!(backend.requests().is_empty());
        })
        .await;
}

#[tokio::test]
async fn template_instances_replace_each_other_and_expire() {
    let html = r#"<div id="toasts"></div>"#;
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(TEMPLATE_ID, r#"<div class="toast">Saved</div>"#);
            let frontend = frontend(html, backend.config());
            let page = frontend.page();
            let data = json!({ "name": "Ada" });

            for _ in 0..2 {
                frontend
                    .instantiate_template("#toasts", TEMPLATE_ID, 200, &data, Some(Duration::from_millis(100)))
                    .await;
            }
            let toasts = page.select_all("#toasts .toast").unwrap();
            assert_eq!(toasts.len(), 1);
            assert_eq!(
                toasts[0].as_element().unwrap().attributes.borrow().get("data-bind-template"),
                Some(TEMPLATE_ID)
            );
            let renders = backend.requests_to(Method::POST, "/html/");
            assert_eq!(renders[0].body, Some(json!({ "status": 200, "data": data })));

            eventually("template removal", || {
                page.select_all("#toasts .toast").unwrap().is_empty()
            })
            .await;
        })
        .await;
}

#[tokio::test]
async fn load_event_is_emulated_once() {
    let html = format!(r#"<div id="boot" data-bind-id="{FORM_ID}" data-bind-events="load"></div>"#);
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            let frontend = frontend(&html, backend.config());
            let successes = record_bus(&frontend, BusEvent::Success);
            frontend.bind_events();
            frontend.bind_events();

            eventually("success event", || successes.borrow().len() == 1).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            let posts = backend.requests_to(Method::POST, "/DOMElement/");
            assert_eq!(posts.len(), 1);
            assert_eq!(posts[0].body.as_ref().unwrap()["htmlEvent"], json!("load"));
        })
        .await;
}

fn scheduled(mode: &str, every: u64) -> String {
    format!(
        r#"<div id="live" data-bind-id="{PANEL_ID}" data-bind-rendering-mode="{mode}"
                data-bind-delay-or-interval="{every}">tick</div>"#
    )
}

#[tokio::test]
async fn load_mode_renders_once_across_rebinds() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, &scheduled("load", 0));
            let frontend = frontend(&scheduled("load", 0), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();

            eventually("reload event", || reloads.borrow().len() == 1).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(backend.requests_to(Method::GET, "/html/").len(), 1);
        })
        .await;
}

#[tokio::test]
async fn delayed_mode_waits_before_rendering() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, &scheduled("delayed", 100));
            let frontend = frontend(&scheduled("delayed", 100), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();

            assert!(backend.requests().is_empty());
            eventually("reload event", || reloads.borrow().len() == 1).await;
            assert_eq!(backend.requests_to(Method::GET, "/html/").len(), 1);
        })
        .await;
}

#[tokio::test]
async fn periodic_mode_keeps_refreshing_the_fragment() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, &scheduled("periodic", 30));
            let frontend = frontend(&scheduled("periodic", 30), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();

            eventually("three refreshes", || reloads.borrow().len() >= 3).await;
            assert_eq!(frontend.page().select_all("#live").unwrap().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn visible_mode_renders_when_shown() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, r#"<div id="live">shown</div>"#);
            let frontend = frontend(&scheduled("visible", 0), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();
            let page = frontend.page();

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert!(backend.requests().is_empty());

            page.set_visible(&page.select_first("#live").unwrap(), true);
            eventually("reload event", || reloads.borrow().len() == 1).await;
            assert!(page.to_html().contains("shown"));
        })
        .await;
}

#[tokio::test]
async fn load_partial_fetches_an_explicit_uri() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(LIST_ID, r#"<aside id="side">loaded</aside>"#);
            let frontend = frontend(r#"<aside id="side">empty</aside>"#, backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            let page = frontend.page();
            let container = page.select_first("#side").unwrap();

            frontend
                .load_partial(&format!("html/{LIST_ID}?tab=1"), &container)
                .await;

            assert_eq!(reloads.borrow().len(), 1);
            assert!(page.to_html().contains("loaded"));
            let fetches = backend.requests_to(Method::GET, "/html/");
            assert_eq!(fetches[0].query.as_deref(), Some("tab=1"));
        })
        .await;
}

#[tokio::test]
async fn zero_period_still_refreshes_repeatedly() {
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(PANEL_ID, &scheduled("periodic", 0));
            let frontend = frontend(&scheduled("periodic", 0), backend.config());
            let reloads = record_bus(&frontend, BusEvent::Reload);
            frontend.bind_events();

            eventually("repeated refreshes", || reloads.borrow().len() >= 3).await;
        })
        .await;
}

#[tokio::test]
async fn table_row_is_replaced_in_place() {
    let row = |text: &str| {
        format!(r#"<tr id="row" data-bind-id="{LIST_ID}"><td>{text}</td></tr>"#)
    };
    LocalSet::new()
        .run_until(async {
            let backend = MockBackend::start().await;
            backend.serve_fragment(LIST_ID, &row("new"));
            let html = format!("<table><tbody>{}</tbody></table>", row("old"));
            let frontend = frontend(&html, backend.config());
            let page = frontend.page();
            let old_row = page.select_first("#row").unwrap();

            frontend.reload_partial("#row", None, &old_row, false).await;

            let rows = page.select_all("table tbody tr").unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].text_contents(), "new");
            assert!(!page.contains(&old_row));
        })
        .await;
}
