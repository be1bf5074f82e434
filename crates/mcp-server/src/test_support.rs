//! Scripted HTTP transport shared by the tool adapter tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_client::http::{
    HttpTransport, Method, RawResponse, RequestBody, TransportError,
};
use tokio::sync::Mutex;

/// One request observed by the fake transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
}

/// Pops the next scripted result per call and records every request.
pub struct FakeTransport {
    results: Mutex<Vec<Result<RawResponse, TransportError>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(results: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: &RequestBody,
        _query: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.clone(),
        });
        let mut results = self.results.lock().await;
        if results.is_empty() {
            return Err(TransportError::Connect("script exhausted".into()));
        }
        results.remove(0)
    }
}

pub fn ok(body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub fn http(status: u16, body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status,
        body: body.to_string(),
    })
}
