//! Batching input adapters for model serving.
//!
//! This crate turns many concurrently-arriving inference requests, each
//! carrying raw JSON or CSV bytes, into one tabular batch handed to a single
//! prediction call, while keeping the ability to fail every request on its
//! own.
//!
//! # Overview
//!
//! A transport (HTTP handler, Lambda shim, CLI) builds one
//! [`InferenceTask`] per request. A serving loop groups tasks and hands the
//! group to an adapter such as [`DataframeInput`], which sniffs each
//! payload's format, decodes every payload into rows, merges the rows in
//! submission order, and records a terminal outcome on every task
//! (`Batched(rows)` or `Discarded(status, message)`).
//!
//! ```
//! use infer_adapters::{DataframeInput, InferenceTask, TaskOutcome};
//!
//! let adapter = DataframeInput::builder().build().unwrap();
//! let mut tasks = vec![
//!     InferenceTask::from_json(r#"[{"a": 1}, {"a": 2}]"#),
//!     InferenceTask::from_json("not json"),
//! ];
//!
//! let batch = adapter.extract(&mut tasks).expect("one payload decoded");
//! assert_eq!(batch.len(), 2);
//! assert_eq!(tasks[0].outcome(), &TaskOutcome::Batched { rows: 2 });
//! assert!(tasks[1].is_discarded());
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Tasks, transport metadata, formats, orients, declared types
//! - [`frame`] - The merged tabular batch and its JSON encodings
//! - [`sniff`] - Payload format detection
//! - [`decode`] - Per-payload decoders and the batch merger
//! - [`adapter`] - The `DataframeInput` adapter and its configuration
//! - [`transport`] - HTTP, Lambda and CLI task construction
//! - [`schema`] - Request schema derived from declared types
//! - [`service`] - Endpoint registration and batched dispatch
//! - [`error`] - Configuration and task errors

pub mod adapter;
pub mod constants;
pub mod decode;
pub mod error;
pub mod frame;
pub mod schema;
pub mod service;
pub mod sniff;
pub mod transport;
pub mod types;

#[cfg(feature = "logging")]
pub mod logging;

// Re-exports for ergonomic access
pub use adapter::{DataframeInput, DataframeInputBuilder, DataframeInputConfig, InputAdapter};
pub use decode::{BatchDecoder, DecodeError, FrameDecoder, TabularDecoder};
pub use error::{AdapterError, HandlerError, ServiceError, TaskError};
pub use frame::{Row, StructuredBatch};
pub use schema::SchemaDescriptor;
pub use service::{BatchPolicy, InferenceService, PredictHandler, TaskResponse};
pub use sniff::FormatSniffer;
pub use types::*;
