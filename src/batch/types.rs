//! Batch identifiers, events and reports.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::VolleyError;
use crate::fetch::{FetchOutcome, Outcome, OutcomeKind, RequestId};

/// Unique identifier of one batch run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        BatchId(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event on a batch's unified stream.
///
/// Exactly one `Outcome` arrives per launched request, in any order, followed by a
/// single `Completed`. Nothing follows `Completed`.
#[derive(Debug)]
pub enum BatchEvent {
    Outcome(FetchOutcome),
    Completed(BatchSummary),
}

/// Totals for a finished batch, carried by the completion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    /// Number of requests launched
    pub size: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn total(&self) -> u32 {
        self.succeeded + self.failed
    }
}

/// Everything a batch produced, gathered by [`BatchHandle::collect`](super::BatchHandle::collect).
#[derive(Debug, Default)]
pub struct BatchReport {
    pub successes: Vec<(RequestId, Bytes)>,
    pub failures: Vec<(RequestId, VolleyError)>,
    /// `None` only if the stream ended without a completion signal
    pub summary: Option<BatchSummary>,
}

impl BatchReport {
    pub(crate) fn push(&mut self, outcome: FetchOutcome) {
        match outcome.outcome {
            Outcome::Success(body) => self.successes.push((outcome.id, body)),
            Outcome::Failure(e) => self.failures.push((outcome.id, e)),
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Outcome kind per request, independent of delivery order.
    pub fn kinds(&self) -> BTreeMap<RequestId, OutcomeKind> {
        let successes = self
            .successes
            .iter()
            .map(|(id, _)| (*id, OutcomeKind::Success));
        let failures = self
            .failures
            .iter()
            .map(|(id, e)| (*id, OutcomeKind::from(e)));
        successes.chain(failures).collect()
    }
}
