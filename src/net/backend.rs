use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::config::FrontendConfig;
use crate::dom::element::is_identity;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("backend answered {status} for {url}")]
    Status { status: u16, url: String },
}

/// Outcome of a remote action call.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub status_text: String,
    pub json: Value,
}

/// HTTP client for the REST surface the runtime talks to.
#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    root: Url,
}

impl Backend {
    pub fn new(config: &FrontendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            root: config.root.clone(),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.root.join(path.trim_start_matches('/'))?)
    }

    /// `POST {root}/DOMElement/{identity}/event`. Any HTTP status is a
    /// response; only transport failures are errors.
    pub async fn post_event(
        &self,
        identity: &str,
        payload: &Value,
    ) -> Result<RemoteResponse, BackendError> {
        let url = self.endpoint(&format!("DOMElement/{identity}/event"))?;
        tracing::debug!(target: "backend", %url, "posting event");
        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(RemoteResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            json: parse_body(&body),
        })
    }

    /// `GET {root}/html/{identity}{suffix}` where `suffix` comes from the
    /// parameter encoder.
    pub async fn fetch_html(&self, identity: &str, suffix: &str) -> Result<String, BackendError> {
        let url = self.endpoint(&format!("html/{identity}{suffix}"))?;
        self.get_text(url).await
    }

    /// Fetch an explicit URI, resolved against the root when relative.
    pub async fn fetch_uri(&self, uri: &str) -> Result<String, BackendError> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.endpoint(uri)?,
            Err(err) => return Err(err.into()),
        };
        self.get_text(url).await
    }

    /// `POST {root}/html/{identity}` with `{status, data}`.
    pub async fn render_template(
        &self,
        identity: &str,
        status: u16,
        data: &Value,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(&format!("html/{identity}"))?;
        let response = self
            .http
            .post(url.clone())
            .json(&json!({ "status": status, "data": data }))
            .send()
            .await?;
        checked_text(url, response).await
    }

    /// `GET {root}/rest/DOMElement?{key}={value}`, returning the first
    /// well-formed identity in the result list.
    pub async fn lookup_identity(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Option<String>, BackendError> {
        let url = self.endpoint("rest/DOMElement")?;
        let response = self
            .http
            .get(url.clone())
            .query(&[(key, value)])
            .send()
            .await?;
        let body = checked_text(url, response).await?;
        let json = parse_body(&body);
        let identity = json
            .get("result")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("id").and_then(Value::as_str))
            .find(|id| is_identity(id))
            .map(str::to_string);
        Ok(identity)
    }

    /// `POST {root}/logout`.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let url = self.endpoint("logout")?;
        let response = self.http.post(url.clone()).send().await?;
        checked_text(url, response).await.map(|_| ())
    }

    async fn get_text(&self, url: Url) -> Result<String, BackendError> {
        tracing::debug!(target: "backend", %url, "fetching");
        let response = self.http.get(url.clone()).send().await?;
        checked_text(url, response).await
    }
}

async fn checked_text(url: Url, response: reqwest::Response) -> Result<String, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

// Empty or non-JSON bodies still carry a status worth classifying.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or(Value::Null)
}
