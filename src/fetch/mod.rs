//! Timed fetch: one network operation raced against its deadline.
//!
//! The operation runs as its own task and reports through a oneshot channel. The
//! caller selects over that channel, a deadline timer and the batch's cancellation
//! token; whichever resolves first decides the outcome:
//!
//! ```text
//!                 ┌── result channel ──> Success(payload) | Failure(Transport)
//! timed_fetch ────┼── deadline timer ──> Failure(DeadlineExceeded)
//!                 └── scope.cancelled ─> Failure(Cancelled)
//! ```
//!
//! The losing operation is either aborted or left to finish with its result
//! discarded, depending on the [`DeadlinePolicy`].

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::VolleyError;
use crate::http::HttpClient;
use crate::metrics;

pub mod types;

pub use types::{DeadlinePolicy, FetchOutcome, FetchRequest, Outcome, OutcomeKind, RequestId};

/// Fetch `request.url` with `client`, giving up after `timeout`.
///
/// Always returns exactly one outcome; nothing is propagated as an error.
///
/// `scope` is the cancellation handle of the enclosing batch. Cancelling it resolves
/// a pending fetch to [`VolleyError::Cancelled`] and releases the operation the same
/// way a timeout does.
///
/// If the deadline elapses at the same instant the operation completes, either
/// branch may win: the outcome is then success or deadline-exceeded
/// non-deterministically. This race is accepted; the select is deliberately unbiased.
#[tracing::instrument(
    skip(client, request, scope),
    fields(request_id = %request.id, url = %request.url, timeout_ms = duration_ms(timeout))
)]
pub async fn timed_fetch<H>(
    client: H,
    request: FetchRequest,
    timeout: Duration,
    policy: DeadlinePolicy,
    scope: &CancellationToken,
) -> FetchOutcome
where
    H: HttpClient + 'static,
{
    let FetchRequest { id, url } = request;
    let started = Instant::now();

    let (tx, rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let result = client.get(&url).await;
        // Fails only when the deadline or cancellation branch already reported
        let _ = tx.send(result);
    });

    // Covers every exit path, including this future being dropped by its owner.
    // Aborting an already finished task is a no-op.
    let _release = scopeguard::guard(task.abort_handle(), move |handle| {
        if policy == DeadlinePolicy::Abort {
            handle.abort();
        }
    });

    let _in_flight = metrics::InFlightGuard::new();

    let outcome = tokio::select! {
        result = rx => match result {
            Ok(Ok(response)) => {
                tracing::debug!(
                    status = response.status,
                    response_len = response.body.len(),
                    "Fetch completed"
                );
                Outcome::Success(response.body)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Fetch failed");
                Outcome::Failure(e)
            }
            Err(_) => {
                // Sender dropped without a value: the operation task panicked
                tracing::error!("Fetch task terminated without a result");
                Outcome::Failure(VolleyError::TaskTerminated)
            }
        },
        // `sleep` saturates a deadline too far out to represent
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(?policy, "Fetch deadline exceeded");
            Outcome::Failure(VolleyError::DeadlineExceeded {
                timeout_ms: duration_ms(timeout),
            })
        }
        _ = scope.cancelled() => {
            tracing::info!(?policy, "Fetch cancelled");
            Outcome::Failure(VolleyError::Cancelled)
        }
    };

    metrics::record_fetch(outcome.kind(), started.elapsed());

    FetchOutcome { id, outcome }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
