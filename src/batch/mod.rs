//! Batch orchestrator: fan out one timed fetch per request, fan outcomes back in.
//!
//! Every request in `[0, N)` runs as its own task in a `JoinSet`. Units share the
//! batch's cancellation scope but each gets its own child token and deadline, so one
//! unit timing out never affects its siblings. A supervisor task joins every unit and
//! only then emits the completion signal:
//!
//! ```text
//!            ┌─ unit 0 ─ timed_fetch ─┐
//! run(n) ────┼─ unit 1 ─ timed_fetch ─┼──> Outcome(..) × N, then Completed(summary)
//!            └─ unit … ─ timed_fetch ─┘        ▲
//!                 supervisor: join all ────────┘
//! ```
//!
//! Each unit sends its outcome before its task finishes, and the channel is FIFO, so
//! `Completed` can never be observed ahead of an outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::VolleyError;
use crate::fetch::{
    DeadlinePolicy, FetchOutcome, FetchRequest, Outcome, OutcomeKind, RequestId, timed_fetch,
};
use crate::http::HttpClient;
use crate::metrics;
use crate::target::UrlTemplate;

pub mod stream;
pub mod types;

pub use stream::{BatchHandle, FailureStream, SuccessStream};
pub use types::{BatchEvent, BatchId, BatchReport, BatchSummary};

/// Configuration for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of requests launched by [`Batch::run`]
    pub batch_size: u32,

    /// Deadline for each individual fetch in milliseconds
    pub per_fetch_timeout_ms: u64,

    /// Template mapping a request id to its URL
    pub url_template: UrlTemplate,

    /// What to do with an operation that lost the race against its deadline
    pub deadline_policy: DeadlinePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            per_fetch_timeout_ms: 5000,
            url_template: UrlTemplate::default(),
            deadline_policy: DeadlinePolicy::Abort,
        }
    }
}

impl BatchConfig {
    pub fn per_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.per_fetch_timeout_ms)
    }
}

/// Launches batches of concurrent timed fetches.
pub struct Batch<H>
where
    H: HttpClient,
{
    http_client: Arc<H>,
    config: BatchConfig,
}

impl<H> Batch<H>
where
    H: HttpClient + 'static,
{
    pub fn new(http_client: Arc<H>, config: BatchConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run a batch of the configured size. See [`Batch::run_n`].
    pub fn run(&self, scope: &CancellationToken) -> BatchHandle {
        self.run_n(self.config.batch_size, scope)
    }

    /// Launch `n` concurrent fetches and return a handle streaming their outcomes.
    ///
    /// Returns immediately; the work proceeds in spawned tasks. Must be called from
    /// within a Tokio runtime.
    ///
    /// `scope` is the caller's root cancellation handle. Cancelling it (or calling
    /// [`BatchHandle::cancel`]) resolves every still-pending fetch to
    /// [`VolleyError::Cancelled`]. The batch never fails as a whole: every request
    /// yields exactly one outcome and the stream always ends with `Completed`.
    pub fn run_n(&self, n: u32, scope: &CancellationToken) -> BatchHandle {
        let batch_id = BatchId::new();
        let span = tracing::info_span!("batch", batch_id = %batch_id, size = n);
        let started_at = chrono::Utc::now();

        // Released at teardown; cancelling it also reaches every unit
        let batch_scope = scope.child_token();

        // Every unit sends exactly once, plus the completion signal: sends never wait
        let (tx, rx) = mpsc::channel(n as usize + 1);

        let timeout = self.config.per_fetch_timeout();
        let policy = self.config.deadline_policy;

        let mut join_set: JoinSet<OutcomeKind> = JoinSet::new();
        let mut task_ids = HashMap::with_capacity(n as usize);

        span.in_scope(|| {
            tracing::debug!(
                timeout_ms = self.config.per_fetch_timeout_ms,
                ?policy,
                "Launching batch"
            );
        });

        for i in 0..n {
            let id = RequestId(i);
            let request = FetchRequest {
                id,
                url: self.config.url_template.build(id),
            };
            let http_client = (*self.http_client).clone();
            let unit_scope = batch_scope.child_token();
            let tx = tx.clone();

            let handle = join_set.spawn(
                async move {
                    let fetched =
                        timed_fetch(http_client, request, timeout, policy, &unit_scope).await;
                    let kind = fetched.outcome.kind();
                    // Receiver is gone if the consumer dropped the handle; nothing to do
                    let _ = tx.send(BatchEvent::Outcome(fetched)).await;
                    kind
                }
                .instrument(span.clone()),
            );
            task_ids.insert(handle.id(), id);
        }

        tokio::spawn(
            supervise(
                join_set,
                task_ids,
                tx,
                batch_scope.clone(),
                batch_id,
                n,
                started_at,
            )
            .instrument(span),
        );

        BatchHandle::new(batch_id, n, rx, batch_scope)
    }
}

/// Wait for every unit, then emit the completion signal and release the batch scope.
async fn supervise(
    mut join_set: JoinSet<OutcomeKind>,
    task_ids: HashMap<tokio::task::Id, RequestId>,
    tx: mpsc::Sender<BatchEvent>,
    batch_scope: CancellationToken,
    batch_id: BatchId,
    size: u32,
    started_at: chrono::DateTime<chrono::Utc>,
) {
    let mut succeeded = 0u32;
    let mut failed = 0u32;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(OutcomeKind::Success) => succeeded += 1,
            Ok(_) => failed += 1,
            Err(join_error) => {
                // The unit died before sending; report on its behalf so the request
                // still yields exactly one outcome
                failed += 1;
                // Every unit's task id is recorded before the supervisor starts, so the
                // lookup only misses if that bookkeeping is broken
                let id = task_ids.get(&join_error.id()).copied();
                debug_assert!(id.is_some(), "join error for an unrecorded task");
                let Some(id) = id else {
                    tracing::error!(error = %join_error, "Unknown fetch task terminated");
                    continue;
                };
                tracing::error!(request_id = %id, error = %join_error, "Fetch task panicked");
                let _ = tx
                    .send(BatchEvent::Outcome(FetchOutcome {
                        id,
                        outcome: Outcome::Failure(VolleyError::TaskTerminated),
                    }))
                    .await;
            }
        }
    }

    batch_scope.cancel();

    let summary = BatchSummary {
        batch_id,
        size,
        succeeded,
        failed,
        started_at,
        finished_at: chrono::Utc::now(),
    };

    metrics::record_batch();
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        "Batch completed"
    );

    let _ = tx.send(BatchEvent::Completed(summary)).await;
}
