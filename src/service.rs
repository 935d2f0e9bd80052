//! Endpoint registration and batched dispatch.
//!
//! An [`InferenceService`] is an ordered table of endpoints. Each endpoint
//! pairs an [`InputAdapter`] with a [`PredictHandler`] and a [`BatchPolicy`].
//! Dispatch runs the adapter once per group of tasks, calls the handler once
//! with the merged batch, and splits the handler's outputs back into one
//! [`TaskResponse`] per task using each task's contiguous row range.
//!
//! How many tasks form a group and how long a front end waits for them is
//! the caller's business; [`InferenceService::handle_batch`] only enforces
//! the size cap of the policy.
//!
//! # Example
//!
//! ```
//! use infer_adapters::service::SyncPredictHandler;
//! use infer_adapters::{DataframeInput, InferenceService, InferenceTask, StructuredBatch};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = InferenceService::builder("iris")
//!     .endpoint(
//!         "predict",
//!         DataframeInput::builder().build().unwrap(),
//!         SyncPredictHandler::new(|batch: &StructuredBatch| Ok(batch.column("x"))),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let responses = service
//!     .handle_batch(
//!         "predict",
//!         vec![
//!             InferenceTask::from_json(r#"[{"x": 1}, {"x": 2}]"#),
//!             InferenceTask::from_csv("x\n3\n"),
//!         ],
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(responses[0].body, serde_json::json!([1, 2]));
//! assert_eq!(responses[1].body, serde_json::json!([3]));
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::InputAdapter;
use crate::constants::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_LATENCY_MS};
use crate::error::{HandlerError, ServiceError};
use crate::frame::{row_ranges, StructuredBatch};
use crate::transport::{HttpRequest, LambdaEvent};
use crate::types::task::{InferenceTask, TaskOutcome};

/// A prediction function over a merged batch.
///
/// Must return exactly one output per row of `batch`, in row order.
#[async_trait]
pub trait PredictHandler: Send + Sync {
    /// Runs the prediction.
    async fn predict(&self, batch: StructuredBatch) -> Result<Vec<Value>, HandlerError>;
}

/// A [`PredictHandler`] backed by a synchronous closure.
pub struct SyncPredictHandler<F>
where
    F: Fn(&StructuredBatch) -> Result<Vec<Value>, HandlerError> + Send + Sync,
{
    handler: F,
}

impl<F> fmt::Debug for SyncPredictHandler<F>
where
    F: Fn(&StructuredBatch) -> Result<Vec<Value>, HandlerError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPredictHandler").finish()
    }
}

impl<F> SyncPredictHandler<F>
where
    F: Fn(&StructuredBatch) -> Result<Vec<Value>, HandlerError> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> PredictHandler for SyncPredictHandler<F>
where
    F: Fn(&StructuredBatch) -> Result<Vec<Value>, HandlerError> + Send + Sync,
{
    async fn predict(&self, batch: StructuredBatch) -> Result<Vec<Value>, HandlerError> {
        (self.handler)(&batch)
    }
}

/// Batching flags of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    /// Merge tasks into one prediction call.
    pub batch: bool,
    /// Most tasks per group.
    pub max_batch_size: usize,
    /// Longest time a front end should wait to fill a group.
    pub max_latency_ms: u64,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch: true,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
        }
    }
}

impl BatchPolicy {
    /// One task per prediction call.
    pub fn unbatched() -> Self {
        Self {
            batch: false,
            ..Self::default()
        }
    }

    /// Caps groups at `size` tasks.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the latency hint.
    pub fn with_max_latency_ms(mut self, latency_ms: u64) -> Self {
        self.max_latency_ms = latency_ms;
        self
    }

    fn group_size(&self) -> usize {
        if self.batch {
            self.max_batch_size
        } else {
            1
        }
    }
}

/// Reply for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Id of the answered task.
    pub task_id: String,
    /// HTTP status.
    pub status: u16,
    /// Outputs for the task's rows, or an error message.
    pub body: Value,
}

impl TaskResponse {
    fn ok(task: &InferenceTask, outputs: &[Value]) -> Self {
        Self {
            task_id: task.id().to_string(),
            status: 200,
            body: Value::Array(outputs.to_vec()),
        }
    }

    fn error(task: &InferenceTask, status: u16, message: impl Into<String>) -> Self {
        Self {
            task_id: task.id().to_string(),
            status,
            body: Value::String(message.into()),
        }
    }

    /// Reply for a task that never reached the prediction function.
    fn unserved(task: &InferenceTask) -> Self {
        match task.outcome() {
            TaskOutcome::Discarded { status, message } => {
                Self::error(task, *status, message.clone())
            },
            TaskOutcome::Batched { .. } | TaskOutcome::Pending => {
                Self::error(task, 500, "Task was not processed")
            },
        }
    }

    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A registered endpoint.
pub struct Endpoint {
    name: String,
    adapter: Arc<dyn InputAdapter>,
    handler: Arc<dyn PredictHandler>,
    policy: BatchPolicy,
    doc: Option<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("adapter", &self.adapter.name())
            .field("policy", &self.policy)
            .field("doc", &self.doc)
            .finish()
    }
}

impl Endpoint {
    /// Endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint's adapter.
    pub fn adapter(&self) -> &Arc<dyn InputAdapter> {
        &self.adapter
    }

    /// Batching flags.
    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Documentation string.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Service metadata entry for this endpoint.
    pub fn metadata(&self) -> Value {
        json!({
            "name": self.name,
            "docs": self.doc,
            "input_type": self.adapter.name(),
            "input_config": self.adapter.config_view(),
            "batch": self.policy.batch,
            "mb_max_batch_size": self.policy.max_batch_size,
            "mb_max_latency": self.policy.max_latency_ms,
            "request_schema": self.adapter.request_schema(),
        })
    }
}

/// Registration table of endpoints.
#[derive(Debug)]
pub struct InferenceService {
    name: String,
    endpoints: IndexMap<String, Endpoint>,
}

impl InferenceService {
    /// Starts building a service.
    pub fn builder(name: impl Into<String>) -> InferenceServiceBuilder {
        InferenceServiceBuilder::new(name)
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoints in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Looks up an endpoint.
    pub fn endpoint(&self, name: &str) -> Result<&Endpoint, ServiceError> {
        self.endpoints
            .get(name)
            .ok_or_else(|| ServiceError::UnknownEndpoint {
                name: name.to_string(),
            })
    }

    /// Service metadata for documentation tooling.
    pub fn metadata(&self) -> Value {
        json!({
            "name": self.name,
            "endpoints": self.endpoints().map(Endpoint::metadata).collect::<Vec<_>>(),
        })
    }

    /// Answers an HTTP request on its own.
    pub async fn handle_http(
        &self,
        endpoint: &str,
        request: HttpRequest,
    ) -> Result<TaskResponse, ServiceError> {
        let task = self.endpoint(endpoint)?.adapter.task_from_http(request).await;
        self.handle_one(endpoint, task).await
    }

    /// Answers a Lambda event.
    pub async fn handle_lambda(
        &self,
        endpoint: &str,
        event: LambdaEvent,
    ) -> Result<TaskResponse, ServiceError> {
        let task = self.endpoint(endpoint)?.adapter.task_from_lambda(event);
        self.handle_one(endpoint, task).await
    }

    /// Answers every input given on the command line, as one group.
    pub async fn handle_cli(
        &self,
        endpoint: &str,
        args: &[String],
    ) -> Result<Vec<TaskResponse>, ServiceError> {
        let tasks = self
            .endpoint(endpoint)?
            .adapter
            .tasks_from_cli(args)
            .map_err(|err| ServiceError::InvalidArguments {
                message: err.to_string(),
            })?;
        self.handle_batch(endpoint, tasks).await
    }

    async fn handle_one(
        &self,
        endpoint: &str,
        task: InferenceTask,
    ) -> Result<TaskResponse, ServiceError> {
        let mut responses = self.handle_batch(endpoint, vec![task]).await?;
        responses.pop().ok_or_else(|| ServiceError::UnknownEndpoint {
            name: endpoint.to_string(),
        })
    }

    /// Runs a group of tasks through an endpoint.
    ///
    /// Tasks that are already discarded are answered from their outcome.
    /// The others are split into groups of at most `max_batch_size` tasks;
    /// each group is extracted once and predicted once. Responses come back
    /// in submission order.
    pub async fn handle_batch(
        &self,
        endpoint: &str,
        tasks: Vec<InferenceTask>,
    ) -> Result<Vec<TaskResponse>, ServiceError> {
        let endpoint = self.endpoint(endpoint)?;

        let mut responses: Vec<Option<TaskResponse>> = vec![None; tasks.len()];
        let mut positions = Vec::with_capacity(tasks.len());
        let mut pending = Vec::with_capacity(tasks.len());
        for (position, task) in tasks.into_iter().enumerate() {
            if task.is_pending() {
                positions.push(position);
                pending.push(task);
            } else {
                responses[position] = Some(TaskResponse::unserved(&task));
            }
        }

        let group_size = endpoint.policy.group_size().max(1);
        let mut served = Vec::with_capacity(pending.len());
        for group in pending.chunks_mut(group_size) {
            served.extend(run_group(endpoint, group).await);
        }
        for (position, response) in positions.into_iter().zip(served) {
            responses[position] = Some(response);
        }

        Ok(responses.into_iter().flatten().collect())
    }
}

async fn run_group(endpoint: &Endpoint, group: &mut [InferenceTask]) -> Vec<TaskResponse> {
    let Some(batch) = endpoint.adapter.extract(group) else {
        return group.iter().map(TaskResponse::unserved).collect();
    };

    let rows = batch.len();
    tracing::info!(
        endpoint = %endpoint.name,
        tasks = group.len(),
        rows,
        "Dispatching batch"
    );

    let outputs = match endpoint.handler.predict(batch).await {
        Ok(outputs) if outputs.len() == rows => outputs,
        Ok(outputs) => {
            tracing::error!(
                endpoint = %endpoint.name,
                rows,
                outputs = outputs.len(),
                "Prediction output count does not match batch rows"
            );
            let message = format!(
                "Prediction returned {} outputs for {rows} rows",
                outputs.len()
            );
            return fail_batched(group, &message);
        },
        Err(err) => {
            tracing::error!(endpoint = %endpoint.name, error = %err, "Prediction failed");
            return fail_batched(group, err.message());
        },
    };

    let counts: Vec<usize> = group
        .iter()
        .map(|task| task.batched_rows().unwrap_or(0))
        .collect();
    group
        .iter()
        .zip(row_ranges(&counts))
        .map(|(task, range)| match (task.outcome(), outputs.get(range.clone())) {
            (TaskOutcome::Batched { .. }, Some(outputs)) => TaskResponse::ok(task, outputs),
            (TaskOutcome::Batched { .. }, None) => {
                tracing::error!(
                    endpoint = %endpoint.name,
                    task_id = %task.id(),
                    start = range.start,
                    end = range.end,
                    rows,
                    "Batched rows of the group exceed the batch"
                );
                TaskResponse::error(task, 500, "Task rows are outside the batch")
            },
            _ => TaskResponse::unserved(task),
        })
        .collect()
}

fn fail_batched(group: &[InferenceTask], message: &str) -> Vec<TaskResponse> {
    group
        .iter()
        .map(|task| match task.outcome() {
            TaskOutcome::Batched { .. } => TaskResponse::error(task, 500, message),
            _ => TaskResponse::unserved(task),
        })
        .collect()
}

/// Builder for [`InferenceService`].
pub struct InferenceServiceBuilder {
    name: String,
    endpoints: Vec<Endpoint>,
}

impl fmt::Debug for InferenceServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceServiceBuilder")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl InferenceServiceBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoints: Vec::new(),
        }
    }

    /// Registers an endpoint with the default batching policy.
    pub fn endpoint(
        self,
        name: impl Into<String>,
        adapter: impl InputAdapter + 'static,
        handler: impl PredictHandler + 'static,
    ) -> Self {
        self.endpoint_with_policy(name, adapter, handler, BatchPolicy::default(), None)
    }

    /// Registers an endpoint with an explicit policy and documentation.
    pub fn endpoint_with_policy(
        self,
        name: impl Into<String>,
        adapter: impl InputAdapter + 'static,
        handler: impl PredictHandler + 'static,
        policy: BatchPolicy,
        doc: Option<String>,
    ) -> Self {
        self.endpoint_arc(name, Arc::new(adapter), Arc::new(handler), policy, doc)
    }

    /// Registers an endpoint sharing an adapter and handler.
    pub fn endpoint_arc(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn InputAdapter>,
        handler: Arc<dyn PredictHandler>,
        policy: BatchPolicy,
        doc: Option<String>,
    ) -> Self {
        self.endpoints.push(Endpoint {
            name: name.into(),
            adapter,
            handler,
            policy,
            doc,
        });
        self
    }

    /// Validates the registrations and builds the service.
    pub fn build(self) -> Result<InferenceService, ServiceError> {
        let mut endpoints = IndexMap::with_capacity(self.endpoints.len());
        for endpoint in self.endpoints {
            validate(&endpoint)?;
            if endpoints.contains_key(&endpoint.name) {
                return Err(ServiceError::DuplicateEndpoint {
                    name: endpoint.name,
                });
            }
            tracing::debug!(
                service = %self.name,
                endpoint = %endpoint.name,
                adapter = endpoint.adapter.name(),
                batch = endpoint.policy.batch,
                "Registered endpoint"
            );
            endpoints.insert(endpoint.name.clone(), endpoint);
        }
        Ok(InferenceService {
            name: self.name,
            endpoints,
        })
    }
}

fn validate(endpoint: &Endpoint) -> Result<(), ServiceError> {
    let policy = endpoint.policy;
    if policy.batch && !endpoint.adapter.supports_batch_mode() {
        return Err(ServiceError::InvalidPolicy {
            endpoint: endpoint.name.clone(),
            reason: format!("{} does not support batching", endpoint.adapter.name()),
        });
    }
    if !policy.batch && !endpoint.adapter.supports_single_mode() {
        return Err(ServiceError::SingleModeUnsupported {
            endpoint: endpoint.name.clone(),
            adapter: endpoint.adapter.name(),
        });
    }
    if policy.batch && policy.max_batch_size == 0 {
        return Err(ServiceError::InvalidPolicy {
            endpoint: endpoint.name.clone(),
            reason: "max_batch_size must be at least 1".to_string(),
        });
    }
    Ok(())
}
