//! Resilient request engine.
//!
//! Issues one logical HTTP call per [`RequestEngine::request`] invocation:
//! builds the request, classifies failures, retries transport-level errors
//! with bounded exponential backoff, and decodes the body. HTTP-level error
//! statuses are never retried; retrying a semantically failed request would
//! not converge and wastes the budget meant for transient network blips.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::RagflowConfig;
use crate::error::{RagflowError, Result};

const USER_AGENT: &str = concat!("ragflow-mcp/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF_SECS: u64 = 30;
const POOL_MAX_IDLE_PER_HOST: usize = 30;
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// One multipart file upload plus accompanying form fields. The engine owns
/// the bytes so a retried attempt can rebuild the form.
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

/// Request body; JSON and multipart are mutually exclusive per call.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartPayload),
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Network-layer failures, the only class of error that is retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
}

/// Seam between the retry engine and the wire. The production implementation
/// is [`ReqwestTransport`]; tests script responses through a fake.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: &RequestBody,
        query: &[(String, String)],
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Pooled reqwest-backed transport. Carries the bearer credential and client
/// identifier on every request.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &RagflowConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key);
        let mut auth = HeaderValue::from_str(&bearer).map_err(|_| {
            RagflowError::configuration("api_key contains characters not valid in a header")
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(|err| {
                RagflowError::configuration(format!("failed to build HTTP client: {err}"))
            })?;

        log::debug!("HTTP connection pool created");
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: &RequestBody,
        query: &[(String, String)],
    ) -> std::result::Result<RawResponse, TransportError> {
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(json) => request.json(json),
            RequestBody::Multipart(payload) => {
                let mut part = reqwest::multipart::Part::bytes(payload.bytes.clone())
                    .file_name(payload.file_name.clone());
                part = part
                    .mime_str(&payload.content_type)
                    .map_err(|err| TransportError::Connect(format!("invalid content type: {err}")))?;
                let mut form = reqwest::multipart::Form::new().part("file", part);
                for (name, value) in &payload.fields {
                    form = form.text(name.clone(), value.clone());
                }
                request.multipart(form)
            }
        };

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        Ok(RawResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(err.to_string())
    }
}

/// Backoff before retry `attempt` (0-based): 1s, 2s, 4s, ... capped at 30s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Issues requests against the configured base URL with bounded retry.
///
/// The transport is created lazily on first use and released by [`close`];
/// a closed engine transparently re-creates the pool on the next call, and
/// closing twice is a no-op.
///
/// [`close`]: RequestEngine::close
pub struct RequestEngine {
    config: RagflowConfig,
    transport: Mutex<Option<Arc<dyn HttpTransport>>>,
    injected: Option<Arc<dyn HttpTransport>>,
}

impl RequestEngine {
    pub fn new(config: RagflowConfig) -> Self {
        Self {
            config,
            transport: Mutex::new(None),
            injected: None,
        }
    }

    /// Build an engine over a caller-supplied transport (tests).
    pub fn with_transport(config: RagflowConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport: Mutex::new(None),
            injected: Some(transport),
        }
    }

    async fn transport(&self) -> Result<Arc<dyn HttpTransport>> {
        let mut slot = self.transport.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let transport: Arc<dyn HttpTransport> = match &self.injected {
            Some(injected) => Arc::clone(injected),
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        *slot = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Release the pooled connection set. Idempotent.
    pub async fn close(&self) {
        if self.transport.lock().await.take().is_some() {
            log::debug!("HTTP connection pool released");
        }
    }

    /// Perform one logical request and decode the response body as JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        query: &[(String, String)],
    ) -> Result<Value> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let transport = self.transport().await?;

        let mut attempt: u32 = 0;
        loop {
            log::debug!("{} {url} (attempt {})", method.as_str(), attempt + 1);
            match transport.execute(method, &url, &body, query).await {
                Ok(raw) => return self.decode(raw),
                Err(err) if attempt < self.config.max_retries => {
                    let wait = backoff_delay(attempt);
                    log::warn!(
                        "Network error, retrying in {}s (attempt {}/{}): {err}",
                        wait.as_secs(),
                        attempt + 1,
                        self.config.max_retries
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(TransportError::Timeout) => {
                    return Err(RagflowError::api(format!(
                        "Request timed out after {}s. Please check your connection or try again later.",
                        self.config.timeout_secs
                    )));
                }
                Err(TransportError::Connect(_)) => {
                    return Err(RagflowError::api(
                        "Connection error: unable to reach the RAGFlow server. \
                         Please check the server URL and network connection.",
                    ));
                }
            }
        }
    }

    fn decode(&self, raw: RawResponse) -> Result<Value> {
        if raw.status == 401 {
            log::error!("Authentication failed");
            return Err(RagflowError::Authentication);
        }

        if raw.status >= 400 {
            let message = serde_json::from_str::<Value>(&raw.body)
                .ok()
                .and_then(|parsed| {
                    parsed
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| {
                    let preview: String = raw.body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
                    if preview.is_empty() {
                        format!("HTTP {}", raw.status)
                    } else {
                        format!("HTTP {}: {preview}", raw.status)
                    }
                });
            log::error!("API error {}: {message}", raw.status);
            return Err(RagflowError::Api {
                message,
                status_code: Some(raw.status),
                body: Some(raw.body),
            });
        }

        if raw.body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&raw.body)
            .map_err(|err| RagflowError::api(format!("Invalid JSON response: {err}")))
    }
}
