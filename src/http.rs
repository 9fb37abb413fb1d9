//! HTTP client abstraction for making requests.
//!
//! This module defines the `HttpClient` trait to abstract the network transport,
//! enabling testability with mock implementations.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Response from an HTTP GET.
///
/// The body is an opaque byte payload; nothing here parses or validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body, fully buffered
    pub body: Bytes,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Trait for executing HTTP GET requests.
///
/// Implementations must be safe to call concurrently from every unit of a batch.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.get("https://example.com/photos/1").await?;
/// println!("Status: {}, {} bytes", response.status, response.body.len());
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Perform a GET against `url` and buffer the whole response body.
    ///
    /// # Errors
    /// Returns [`VolleyError::Transport`](crate::VolleyError::Transport) if the
    /// connection, request, or body read fails. Non-2xx statuses are not errors.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new reqwest-based HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        tracing::debug!("Executing HTTP GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::debug!(error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        // The response (and its connection) is released when `bytes()` consumes it,
        // or dropped with this future if the caller aborts us mid-read.
        let body = response.bytes().await?;

        tracing::debug!(status, response_len = body.len(), "HTTP request completed");

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Mock HTTP client for testing.
///
/// Responses are queued per URL and returned in FIFO order. Each one can be
/// immediate, delayed, or held until a trigger fires.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response("https://example.com/photos/0", Ok(HttpResponse::ok("A")));
/// mock.add_delayed_response(
///     "https://example.com/photos/1",
///     Duration::from_secs(10),
///     Ok(HttpResponse::ok("late")),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

enum MockResponse {
    Immediate(Result<HttpResponse>),
    Delayed {
        delay: Duration,
        response: Result<HttpResponse>,
    },
    Triggered {
        response: Result<HttpResponse>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub url: String,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, url: &str, response: MockResponse) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push(response);
    }

    /// Add a response returned as soon as `url` is requested.
    pub fn add_response(&self, url: &str, response: Result<HttpResponse>) {
        self.push(url, MockResponse::Immediate(response));
    }

    /// Add a response returned only after `delay` has elapsed.
    pub fn add_delayed_response(
        &self,
        url: &str,
        delay: Duration,
        response: Result<HttpResponse>,
    ) {
        self.push(url, MockResponse::Delayed { delay, response });
    }

    /// Add a response that waits for a manual trigger before completing.
    ///
    /// The request completes when the returned sender fires or is dropped.
    pub fn add_response_with_trigger(
        &self,
        url: &str,
        response: Result<HttpResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            url,
            MockResponse::Triggered {
                response,
                trigger: rx,
            },
        );
        tx
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of requests currently executing.
    ///
    /// An aborted request leaves this count, so tests can observe that a timed-out
    /// operation was actually torn down.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of requests that ran all the way to returning a result.
    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        // Decrement even if this future is aborted mid-await
        let in_flight = self.in_flight.clone();
        let _guard = scopeguard::guard((), move |_| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        self.calls.lock().push(MockCall {
            url: url.to_string(),
        });

        let mock_response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(url)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        let result = match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Delayed { delay, response }) => {
                tokio::time::sleep(delay).await;
                response
            }
            Some(MockResponse::Triggered { response, trigger }) => {
                // Proceed whether the trigger fired or was dropped
                let _ = trigger.await;
                response
            }
            None => Err(crate::error::VolleyError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                url
            ))),
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}
