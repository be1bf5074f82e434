//! Shared test doubles for the request engine and gateway tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::http::{HttpTransport, Method, RawResponse, RequestBody, TransportError};

/// One request observed by the fake transport.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    pub query: Vec<(String, String)>,
}

/// Scripted transport: pops the next result per call and records every
/// request it saw.
pub(crate) struct FakeTransport {
    results: Mutex<Vec<Result<RawResponse, TransportError>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
    pub calls: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new(results: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn call_count(&self) -> usize {
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
        query: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.clone(),
            query: query.to_vec(),
        });
        let mut results = self.results.lock().await;
        if results.is_empty() {
            return Err(TransportError::Connect("script exhausted".into()));
        }
        results.remove(0)
    }
}

pub(crate) fn ok(body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub(crate) fn http(status: u16, body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status,
        body: body.to_string(),
    })
}
