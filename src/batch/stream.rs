//! Consumer-side views of a running batch.
//!
//! [`BatchHandle`] is the unified stream: tagged outcomes followed by one
//! `Completed` event. [`BatchHandle::split`] turns it into the two-stream form, a
//! success stream whose end is the completion signal plus a failure stream with no
//! done marker of its own.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{BatchEvent, BatchId, BatchReport};
use crate::error::VolleyError;
use crate::fetch::{FetchOutcome, Outcome, RequestId};

/// Handle to a running batch.
///
/// Dropping the handle does not stop the batch: every unit still runs to its outcome
/// and the outcomes are discarded. Call [`BatchHandle::cancel`] to stop early.
pub struct BatchHandle {
    batch_id: BatchId,
    size: u32,
    events: mpsc::Receiver<BatchEvent>,
    scope: CancellationToken,
}

impl BatchHandle {
    pub(crate) fn new(
        batch_id: BatchId,
        size: u32,
        events: mpsc::Receiver<BatchEvent>,
        scope: CancellationToken,
    ) -> Self {
        Self {
            batch_id,
            size,
            events,
            scope,
        }
    }

    pub fn id(&self) -> BatchId {
        self.batch_id
    }

    /// Number of requests launched.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Cancel every still-pending fetch. Each resolves to [`VolleyError::Cancelled`];
    /// the completion signal still follows once all of them have reported.
    pub fn cancel(&self) {
        tracing::info!(batch_id = %self.batch_id, "Batch cancellation requested");
        self.scope.cancel();
    }

    /// The batch's own cancellation token (a child of the caller's root scope).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.scope.clone()
    }

    /// Next event, or `None` once `Completed` has been delivered.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Drain the whole batch.
    pub async fn collect(mut self) -> BatchReport {
        let mut report = BatchReport::default();
        while let Some(event) = self.events.recv().await {
            match event {
                BatchEvent::Outcome(outcome) => report.push(outcome),
                BatchEvent::Completed(summary) => report.summary = Some(summary),
            }
        }
        report
    }

    /// Route outcomes into a success stream and a failure stream.
    ///
    /// Take [`BatchHandle::cancellation_token`] first if the batch may need to be
    /// cancelled after splitting.
    ///
    /// The success stream ends (yields `None`) once every request has reported; that
    /// end is the completion signal. The failure stream stays readable afterwards:
    /// a failure routed just before completion is buffered, never dropped, so drain
    /// it after the success stream ends. Must be called from within a Tokio runtime.
    pub fn split(self) -> (SuccessStream, FailureStream) {
        // At most `size` items ever go to either side: routing never waits on a
        // consumer that only drains one stream
        let capacity = self.size as usize + 1;
        let (success_tx, success_rx) = mpsc::channel(capacity);
        let (failure_tx, failure_rx) = mpsc::channel(capacity);
        let mut events = self.events;
        let batch_id = self.batch_id;

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    BatchEvent::Outcome(FetchOutcome {
                        id,
                        outcome: Outcome::Success(body),
                    }) => {
                        let _ = success_tx.send((id, body)).await;
                    }
                    BatchEvent::Outcome(FetchOutcome {
                        id,
                        outcome: Outcome::Failure(e),
                    }) => {
                        let _ = failure_tx.send((id, e)).await;
                    }
                    BatchEvent::Completed(_) => break,
                }
            }
            tracing::trace!(batch_id = %batch_id, "Closing success stream");
            // Dropping both senders here closes the success stream; buffered failures
            // remain readable until drained
        });

        (
            SuccessStream { rx: success_rx },
            FailureStream { rx: failure_rx },
        )
    }
}

impl Stream for BatchHandle {
    type Item = BatchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Successful payloads, ending when the batch completes.
pub struct SuccessStream {
    rx: mpsc::Receiver<(RequestId, Bytes)>,
}

impl SuccessStream {
    /// Next payload, or `None` once every request has reported.
    pub async fn recv(&mut self) -> Option<(RequestId, Bytes)> {
        self.rx.recv().await
    }
}

impl Stream for SuccessStream {
    type Item = (RequestId, Bytes);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Failed requests, delivered as they occur.
pub struct FailureStream {
    rx: mpsc::Receiver<(RequestId, VolleyError)>,
}

impl FailureStream {
    /// Next failure. Stays readable after the success stream has ended.
    pub async fn recv(&mut self) -> Option<(RequestId, VolleyError)> {
        self.rx.recv().await
    }
}

impl Stream for FailureStream {
    type Item = (RequestId, VolleyError);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
