#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use frontend_bind::{BusEvent, BusListener, Frontend, FrontendConfig, Page, Shell};
use serde_json::{json, Value};
use url::Url;

pub const FORM_ID: &str = "0123456789abcdef0123456789abcdef";
pub const LIST_ID: &str = "fedcba9876543210fedcba9876543210";
pub const PANEL_ID: &str = "00000000000000000000000000000001";
pub const INPUT_ID: &str = "00000000000000000000000000000002";
pub const TEMPLATE_ID: &str = "00000000000000000000000000000003";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    events: Mutex<HashMap<String, (u16, Value)>>,
    fragments: Mutex<HashMap<String, String>>,
    identities: Mutex<HashMap<String, String>>,
}

impl MockState {
    fn record(&self, method: Method, uri: &Uri, body: Option<Value>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            body,
        });
    }
}

/// In-process stand-in for the REST backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    server_handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .route("/DOMElement/:id/event", post(post_event))
            .route("/html/*path", get(get_fragment).post(render_template))
            .route("/rest/DOMElement", get(lookup_identity))
            .route("/logout", post(logout))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let server_handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router.into_make_service()).await {
                tracing::error!(error = %err, "mock backend error");
            }
        });

        Self {
            addr,
            state,
            server_handle,
        }
    }

    pub fn root(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("mock root")
    }

    pub fn config(&self) -> FrontendConfig {
        FrontendConfig::default().with_root(self.root())
    }

    pub fn respond_to_event(&self, id: &str, status: u16, body: Value) {
        self.state
            .events
            .lock()
            .unwrap()
            .insert(id.to_string(), (status, body));
    }

    /// Serve `html` for `GET /html/{id}...` and `POST /html/{id}`.
    pub fn serve_fragment(&self, id: &str, html: &str) {
        self.state
            .fragments
            .lock()
            .unwrap()
            .insert(id.to_string(), html.to_string());
    }

    pub fn register_identity(&self, value: &str, id: &str) {
        self.state
            .identities
            .lock()
            .unwrap()
            .insert(value.to_string(), id.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && request.path.starts_with(prefix))
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

async fn post_event(
    State(state): State<Arc<MockState>>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, serde_json::from_slice(&body).ok());
    let (status, body) = state
        .events
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .unwrap_or((200, json!({})));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, Json(body)).into_response()
}

async fn get_fragment(
    State(state): State<Arc<MockState>>,
    AxumPath(path): AxumPath<String>,
    uri: Uri,
) -> Response {
    state.record(Method::GET, &uri, None);
    fragment_for(&state, &path)
}

async fn render_template(
    State(state): State<Arc<MockState>>,
    AxumPath(path): AxumPath<String>,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, serde_json::from_slice(&body).ok());
    fragment_for(&state, &path)
}

fn fragment_for(state: &MockState, path: &str) -> Response {
    let id = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    match state.fragments.lock().unwrap().get(id) {
        Some(html) => html.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn lookup_identity(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> Response {
    state.record(Method::GET, &uri, None);
    let identities = state.identities.lock().unwrap();
    let result: Vec<Value> = query
        .values()
        .filter_map(|value| identities.get(value))
        .map(|id| json!({ "id": id }))
        .collect();
    Json(json!({ "result": result })).into_response()
}

async fn logout(State(state): State<Arc<MockState>>, uri: Uri) -> Response {
    state.record(Method::POST, &uri, None);
    StatusCode::OK.into_response()
}

/// Collect the payloads of one bus event.
pub fn record_bus(frontend: &Frontend, event: BusEvent) -> Rc<RefCell<Vec<Value>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let listener: BusListener = Rc::new(move |data| sink.borrow_mut().push(data.clone()));
    frontend.bus().add_event_listener(event, listener);
    seen
}

#[derive(Default)]
pub struct RecordingShell {
    pub alerts: RefCell<Vec<String>>,
    pub reloads: Cell<usize>,
}

impl Shell for RecordingShell {
    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

pub fn frontend(html: &str, config: FrontendConfig) -> Rc<Frontend> {
    Frontend::builder(Page::from_html(html), config)
        .build()
        .expect("build frontend")
}

/// Poll `condition` while letting spawned local tasks make progress.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
