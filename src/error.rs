//! Error types for adapter construction and task outcomes.
//!
//! Errors are split the way failures are split at runtime:
//!
//! - [`AdapterError`] covers configuration problems. They are raised while an
//!   adapter is being constructed and never while a request is handled.
//! - Request problems never surface as errors from the adapter. They become
//!   a [`TaskOutcome::Discarded`](crate::types::TaskOutcome::Discarded) on
//!   the affected task instead.
//! - [`TaskError`] flags programming mistakes around the write-once outcome
//!   slot of a task.
//! - [`ServiceError`] covers endpoint registration and lookup.
//! - [`HandlerError`] is returned by prediction functions.

use http::StatusCode;
use thiserror::Error;

use crate::adapter::config::ConfigError;
use crate::types::format::Format;
use crate::types::task::TaskOutcome;

/// Errors raised while constructing an adapter.
///
/// # Examples
///
/// ```
/// use infer_adapters::{AdapterError, DataframeInput};
///
/// let err = DataframeInput::builder().orient("sideways").build().unwrap_err();
/// assert!(matches!(err, AdapterError::InvalidOrient { .. }));
/// assert!(err.to_string().contains("sideways"));
/// ```
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The injected decoder cannot decode one of the formats the sniffer may
    /// select.
    #[error("Missing required decoder for {format} payloads in {adapter}")]
    MissingDecoder {
        /// The adapter being constructed.
        adapter: &'static str,
        /// The format nobody can decode.
        format: Format,
    },

    /// The requested decoding mode is declared but not implemented.
    #[error("Decoding mode '{typ}' is not supported, only 'frame' is")]
    UnsupportedType {
        /// The rejected mode.
        typ: String,
    },

    /// The requested JSON orient is not one of the enumerated orients.
    #[error(
        "Invalid option 'orient'='{orient}', \
         valid options are split, records, index, columns, values"
    )]
    InvalidOrient {
        /// The rejected orient.
        orient: String,
    },

    /// A declared column is named more than once.
    #[error("Column '{column}' is declared more than once")]
    DuplicateColumn {
        /// The repeated name.
        column: String,
    },

    /// Declared columns and declared types name different field sets.
    #[error("dtype must match columns: columns {columns:?}, dtype {dtype:?}")]
    ColumnTypeMismatch {
        /// Declared column names.
        columns: Vec<String>,
        /// Field names that carry a declared type.
        dtype: Vec<String>,
    },

    /// Loading the adapter configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by misuse of a task's outcome slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A terminal outcome was assigned to a task that already had one.
    #[error("task {task_id} already has outcome {current}")]
    OutcomeAlreadySet {
        /// The task whose outcome was assigned twice.
        task_id: String,
        /// The outcome that was kept.
        current: TaskOutcome,
    },
}

impl TaskError {
    /// Maps this error to the HTTP status reported to the transport.
    ///
    /// A double assignment is a server bug, not a client mistake.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OutcomeAlreadySet { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors raised while registering or dispatching endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No endpoint is registered under this name.
    #[error("Unknown endpoint '{name}'")]
    UnknownEndpoint {
        /// Requested endpoint.
        name: String,
    },

    /// Two endpoints share a name.
    #[error("Endpoint '{name}' is registered twice")]
    DuplicateEndpoint {
        /// Repeated endpoint.
        name: String,
    },

    /// The adapter cannot run one task at a time but batching is disabled.
    #[error("Endpoint '{endpoint}': {adapter} does not support running without batching")]
    SingleModeUnsupported {
        /// Endpoint being registered.
        endpoint: String,
        /// Adapter name.
        adapter: &'static str,
    },

    /// Command-line arguments could not be parsed.
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// Parser error.
        message: String,
    },

    /// The batching policy cannot be honoured.
    #[error("Endpoint '{endpoint}': invalid batching policy: {reason}")]
    InvalidPolicy {
        /// Endpoint being registered.
        endpoint: String,
        /// What is wrong with the policy.
        reason: String,
    },
}

impl ServiceError {
    /// Maps this error to the HTTP status reported to the transport.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEndpoint { .. } => StatusCode::NOT_FOUND,
            Self::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure of a prediction function.
///
/// Every task of the group that reached the prediction function is answered
/// with 500 and this message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
