//! Error types for the fetch system.

use thiserror::Error;

/// Result type alias using the volley error type.
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Main error type for the fetch system.
///
/// Per-request variants (`Transport`, `DeadlineExceeded`, `Cancelled`, `TaskTerminated`)
/// only ever travel inside a failure outcome. Running a batch never returns an error.
#[derive(Error, Debug)]
pub enum VolleyError {
    /// The transport failed (connection refused, DNS failure, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The per-request timeout elapsed before the transport completed
    #[error("deadline exceeded after {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },

    /// The root cancellation scope was cancelled while the request was pending
    #[error("request cancelled")]
    Cancelled,

    /// The task running the request died without reporting a result
    #[error("fetch task terminated without a result")]
    TaskTerminated,

    /// The configured URL template is unusable
    #[error("invalid url template: {0}")]
    InvalidUrlTemplate(String),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for VolleyError {
    fn from(e: reqwest::Error) -> Self {
        // Keep the full source chain; reqwest's top-level message is usually just
        // "error sending request".
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = std::error::Error::source(inner);
        }
        VolleyError::Transport(message)
    }
}

impl VolleyError {
    /// True if the request lost the race against its own deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, VolleyError::DeadlineExceeded { .. })
    }

    /// True if the transport itself reported the failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, VolleyError::Transport(_))
    }
}
