//! Concurrent fan-out fetching with per-request deadlines.
//!
//! A [`Batch`] launches one fetch per request identifier, all at once. Each fetch races
//! its HTTP GET against its own deadline and the batch's cancellation scope, and
//! reports exactly one outcome. Outcomes stream back to the caller as they complete,
//! followed by a single completion signal once every request has reported.
//!
//! ```ignore
//! let batch = Batch::new(Arc::new(ReqwestHttpClient::new()), BatchConfig::default());
//! let report = batch.run(&CancellationToken::new()).collect().await;
//! println!("{} succeeded, {} failed", report.successes.len(), report.failures.len());
//! ```

pub mod batch;
pub mod error;
pub mod fetch;
pub mod http;
pub mod metrics;
pub mod report;
pub mod target;

// Re-export commonly used types
pub use batch::{
    Batch, BatchConfig, BatchEvent, BatchHandle, BatchId, BatchReport, BatchSummary,
    FailureStream, SuccessStream,
};
pub use error::{Result, VolleyError};
pub use fetch::{
    DeadlinePolicy, FetchOutcome, FetchRequest, Outcome, OutcomeKind, RequestId, timed_fetch,
};
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use target::UrlTemplate;
