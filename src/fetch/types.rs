//! Value types shared by the timed fetch and the batch orchestrator.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::VolleyError;

/// Identifier of one request within a batch, in `[0, batch_size)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RequestId {
    fn from(id: u32) -> Self {
        RequestId(id)
    }
}

/// One request to perform: its identifier and the URL it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub url: String,
}

/// Terminal result of one fetch.
#[derive(Debug)]
pub enum Outcome {
    /// The transport returned a response; the body is passed through untouched.
    Success(Bytes),
    /// The fetch failed, timed out, or was cancelled.
    Failure(VolleyError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::Failure(e) => OutcomeKind::from(e),
        }
    }
}

/// Payload-free classification of an [`Outcome`], handy for comparing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Transport,
    DeadlineExceeded,
    Cancelled,
    TaskTerminated,
    Other,
}

impl From<&VolleyError> for OutcomeKind {
    fn from(e: &VolleyError) -> Self {
        match e {
            VolleyError::Transport(_) => OutcomeKind::Transport,
            VolleyError::DeadlineExceeded { .. } => OutcomeKind::DeadlineExceeded,
            VolleyError::Cancelled => OutcomeKind::Cancelled,
            VolleyError::TaskTerminated => OutcomeKind::TaskTerminated,
            _ => OutcomeKind::Other,
        }
    }
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Transport => "transport",
            OutcomeKind::DeadlineExceeded => "deadline_exceeded",
            OutcomeKind::Cancelled => "cancelled",
            OutcomeKind::TaskTerminated => "task_terminated",
            OutcomeKind::Other => "other",
        }
    }
}

/// An [`Outcome`] tagged with the request that produced it.
#[derive(Debug)]
pub struct FetchOutcome {
    pub id: RequestId,
    pub outcome: Outcome,
}

/// What happens to the underlying operation once the deadline (or the root scope)
/// wins the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Abort the operation task; its connection and response are dropped immediately.
    #[default]
    Abort,
    /// Let the operation finish in the background and discard whatever it returns.
    Detach,
}
