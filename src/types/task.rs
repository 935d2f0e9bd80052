//! The inference task and its write-once outcome slot.
//!
//! A task is created by a transport for every inbound request, consumed once
//! by an adapter, and reported back to the transport. Its outcome moves from
//! `Pending` to exactly one terminal state:
//!
//! ```text
//! Pending -> Batched { rows }
//! Pending -> Discarded { status, message }
//! Batched / Discarded -> (terminal, no transitions)
//! ```

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{CONTENT_TYPE_CSV, CONTENT_TYPE_JSON};
use crate::error::TaskError;
use crate::types::headers::TransportMetadata;

/// Outcome of an inference task.
///
/// # Examples
///
/// ```
/// use infer_adapters::TaskOutcome;
///
/// let outcome = TaskOutcome::Discarded {
///     status: 400,
///     message: "bad payload".to_string(),
/// };
/// assert!(outcome.is_terminal());
/// assert_eq!(outcome.to_string(), "discarded(400: bad payload)");
///
/// let json = serde_json::to_value(&outcome).unwrap();
/// assert_eq!(json["state"], "discarded");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// No outcome assigned yet.
    Pending,
    /// The task's payload contributed `rows` rows to the merged batch.
    Batched {
        /// Number of rows contributed.
        rows: usize,
    },
    /// The task was dropped from the batch.
    Discarded {
        /// HTTP status reported to the caller.
        status: u16,
        /// Human-readable reason.
        message: String,
    },
}

impl TaskOutcome {
    /// Returns `true` for `Batched` and `Discarded`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Batched { rows } => write!(f, "batched({rows} rows)"),
            Self::Discarded { status, message } => write!(f, "discarded({status}: {message})"),
        }
    }
}

/// One inbound inference request.
///
/// The payload is immutable once the task is built. The outcome can be
/// assigned exactly once through [`discard`](Self::discard) or
/// [`set_batched`](Self::set_batched); a second assignment is rejected with
/// [`TaskError::OutcomeAlreadySet`] and leaves the first outcome in place.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use infer_adapters::{InferenceTask, TaskOutcome};
///
/// let mut task = InferenceTask::from_csv("a,b\n1,2\n");
/// assert!(task.is_pending());
///
/// task.set_batched(1).unwrap();
/// assert_eq!(task.batched_rows(), Some(1));
///
/// // The first outcome wins.
/// assert!(task.discard(StatusCode::BAD_REQUEST, "late").is_err());
/// assert_eq!(task.outcome(), &TaskOutcome::Batched { rows: 1 });
/// ```
#[derive(Debug, Clone)]
pub struct InferenceTask {
    id: String,
    payload: Bytes,
    metadata: TransportMetadata,
    outcome: TaskOutcome,
}

impl InferenceTask {
    /// Creates a pending task with a generated id.
    pub fn new(payload: impl Into<Bytes>, metadata: TransportMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload: payload.into(),
            metadata,
            outcome: TaskOutcome::Pending,
        }
    }

    /// Creates a pending task declared as `application/json`.
    pub fn from_json(payload: impl Into<Bytes>) -> Self {
        Self::new(
            payload,
            TransportMetadata::new().with_content_type(CONTENT_TYPE_JSON),
        )
    }

    /// Creates a pending task declared as `text/csv`.
    pub fn from_csv(payload: impl Into<Bytes>) -> Self {
        Self::new(
            payload,
            TransportMetadata::new().with_content_type(CONTENT_TYPE_CSV),
        )
    }

    /// Replaces the generated id, e.g. with a transport request id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Task identifier used in logs and responses.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw request payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// What the transport knew about the request.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    /// Current outcome.
    pub fn outcome(&self) -> &TaskOutcome {
        &self.outcome
    }

    /// Returns `true` while no outcome is assigned.
    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Pending)
    }

    /// Returns `true` if the task was discarded.
    pub fn is_discarded(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Discarded { .. })
    }

    /// Rows contributed to the batch, if the task was batched.
    pub fn batched_rows(&self) -> Option<usize> {
        match self.outcome {
            TaskOutcome::Batched { rows } => Some(rows),
            _ => None,
        }
    }

    /// Marks the task as dropped from the batch.
    pub fn discard(
        &mut self,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Result<(), TaskError> {
        self.assign(TaskOutcome::Discarded {
            status: status.as_u16(),
            message: message.into(),
        })
    }

    /// Marks the task as contributing `rows` rows to the batch.
    pub fn set_batched(&mut self, rows: usize) -> Result<(), TaskError> {
        self.assign(TaskOutcome::Batched { rows })
    }

    fn assign(&mut self, outcome: TaskOutcome) -> Result<(), TaskError> {
        if self.outcome.is_terminal() {
            return Err(TaskError::OutcomeAlreadySet {
                task_id: self.id.clone(),
                current: self.outcome.clone(),
            });
        }
        self.outcome = outcome;
        Ok(())
    }
}
