//! Input adapters.
//!
//! An adapter consumes a group of [`InferenceTask`]s and produces the single
//! argument handed to the prediction function. [`DataframeInput`] merges
//! JSON and CSV payloads into one [`StructuredBatch`].

pub mod config;

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use indexmap::IndexSet;
use serde_json::{json, Value};

use crate::constants::{DATAFRAME_INPUT_NAME, TYP_FRAME};
use crate::decode::{BatchDecoder, DeclaredTypes, FrameDecoder, TabularDecoder};
use crate::error::AdapterError;
use crate::frame::StructuredBatch;
use crate::schema::SchemaDescriptor;
use crate::sniff::FormatSniffer;
use crate::transport::{self, HttpRequest, LambdaEvent};
use crate::types::dtype::DtypeSpec;
use crate::types::format::{Format, Orient};
use crate::types::task::InferenceTask;

pub use config::{ConfigError, DataframeInputConfig};

/// An adapter between transports and a prediction function.
///
/// Adapters hold configuration only. Every per-request value lives in the
/// tasks passed to [`extract`](Self::extract), so one adapter can serve
/// concurrent groups.
#[async_trait]
pub trait InputAdapter: Send + Sync {
    /// Name reported in discard messages and logs.
    fn name(&self) -> &'static str;

    /// Whether the adapter can run one task at a time.
    fn supports_single_mode(&self) -> bool {
        true
    }

    /// Whether the adapter can merge a group of tasks.
    fn supports_batch_mode(&self) -> bool {
        true
    }

    /// Decodes a group of tasks into one batch.
    ///
    /// Every pending task leaves with a terminal outcome. Returns `None` when
    /// no task contributed rows.
    fn extract(&self, tasks: &mut [InferenceTask]) -> Option<StructuredBatch>;

    /// OpenAPI-style description of the request body.
    fn request_schema(&self) -> Value;

    /// Adapter settings exposed as service metadata.
    fn config_view(&self) -> Value;

    /// Builds a task from an HTTP request.
    async fn task_from_http(&self, request: HttpRequest) -> InferenceTask {
        transport::task_from_http_request(request).await
    }

    /// Builds a task from a Lambda proxy event.
    fn task_from_lambda(&self, event: LambdaEvent) -> InferenceTask {
        transport::task_from_lambda_event(event)
    }

    /// Builds one task per input given on the command line.
    fn tasks_from_cli(&self, args: &[String]) -> Result<Vec<InferenceTask>, clap::Error> {
        transport::tasks_from_cli(args)
    }
}

/// Adapter turning JSON and CSV payloads into one tabular batch.
///
/// # Examples
///
/// ```
/// use infer_adapters::{DataframeInput, InferenceTask};
///
/// let adapter = DataframeInput::builder()
///     .orient("records")
///     .columns(["id", "score"])
///     .build()
///     .unwrap();
///
/// let mut tasks = vec![
///     InferenceTask::from_json(r#"[{"id": 1, "score": 0.5, "extra": true}]"#),
///     InferenceTask::from_csv("id,score\n2,0.25\n3,0.75\n"),
/// ];
/// let batch = adapter.extract(&mut tasks).unwrap();
///
/// assert_eq!(batch.columns(), &["id".to_string(), "score".to_string()]);
/// assert_eq!(batch.len(), 3);
/// assert_eq!(tasks[1].batched_rows(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct DataframeInput {
    typ: String,
    orient: Option<Orient>,
    columns: Option<Vec<String>>,
    dtype: Option<DtypeSpec>,
    echo_limit: usize,
    sniffer: FormatSniffer,
    decoder: BatchDecoder,
}

impl DataframeInput {
    /// Starts building an adapter with default settings.
    pub fn builder() -> DataframeInputBuilder {
        DataframeInputBuilder::new()
    }

    /// Builds an adapter from loaded configuration, validating it.
    pub fn from_config(config: &DataframeInputConfig) -> Result<Self, AdapterError> {
        let mut builder = Self::builder()
            .typ(config.typ.clone())
            .echo_limit(config.echo_limit);
        if let Some(orient) = &config.orient {
            builder = builder.orient(orient.clone());
        }
        if let Some(columns) = &config.columns {
            builder = builder.columns(columns.clone());
        }
        if let Some(dtype) = &config.dtype {
            builder = builder.dtype(dtype.clone());
        }
        builder.build()
    }

    /// Decoding mode.
    pub fn typ(&self) -> &str {
        &self.typ
    }

    /// Configured JSON orient, `None` when guessed per payload.
    pub fn orient(&self) -> Option<Orient> {
        self.orient
    }

    /// Declared columns, explicit or implied by a by-name dtype.
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Declared types.
    pub fn dtype(&self) -> Option<&DtypeSpec> {
        self.dtype.as_ref()
    }

    /// Describes the request body from the declared columns and types.
    pub fn schema_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::new(self.columns.clone(), self.dtype.clone())
    }

    /// Decodes a group of tasks into one batch.
    ///
    /// Tasks that already carry an outcome are skipped. If no pending task
    /// decodes, every pending task is discarded with 400 and `None` is
    /// returned. Otherwise each task that contributed nothing is discarded
    /// with 400 and every other task is marked batched with its row count.
    pub fn extract(&self, tasks: &mut [InferenceTask]) -> Option<StructuredBatch> {
        let pending: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_pending())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return None;
        }

        let formats: Vec<Format> = pending
            .iter()
            .map(|&i| {
                let format = self.sniffer.sniff(&tasks[i]);
                tracing::debug!(task_id = %tasks[i].id(), %format, "Sniffed payload format");
                format
            })
            .collect();
        let payloads: Vec<_> = pending.iter().map(|&i| tasks[i].payload().clone()).collect();

        let output = self.decoder.decode(&payloads, &formats);

        let Some(batch) = output.batch else {
            tracing::warn!(
                adapter = DATAFRAME_INPUT_NAME,
                tasks = pending.len(),
                "No payload in the group could be decoded"
            );
            let message = format!("{DATAFRAME_INPUT_NAME} Wrong input format.");
            for &i in &pending {
                discard(&mut tasks[i], message.clone());
            }
            return None;
        };

        for (&i, &rows) in pending.iter().zip(&output.row_counts) {
            let task = &mut tasks[i];
            if rows == 0 {
                let message = self.discard_message(task.payload());
                discard(task, message);
            } else if let Err(err) = task.set_batched(rows) {
                tracing::error!(error = %err, "Failed to mark task batched");
            } else {
                tracing::debug!(task_id = %task.id(), rows, "Task batched");
            }
        }

        Some(batch)
    }

    fn discard_message(&self, payload: &[u8]) -> String {
        if self.echo_limit == 0 {
            return format!("{DATAFRAME_INPUT_NAME} Wrong input format.");
        }
        format!(
            "{DATAFRAME_INPUT_NAME} Wrong input format: {}.",
            echo(payload, self.echo_limit)
        )
    }
}

#[async_trait]
impl InputAdapter for DataframeInput {
    fn name(&self) -> &'static str {
        DATAFRAME_INPUT_NAME
    }

    fn supports_single_mode(&self) -> bool {
        false
    }

    fn extract(&self, tasks: &mut [InferenceTask]) -> Option<StructuredBatch> {
        DataframeInput::extract(self, tasks)
    }

    fn request_schema(&self) -> Value {
        self.schema_descriptor().describe()
    }

    fn config_view(&self) -> Value {
        json!({
            "typ": self.typ,
            "orient": self.orient.map(|o| o.as_str()),
            "dtype": self.dtype,
        })
    }

    fn task_from_lambda(&self, event: LambdaEvent) -> InferenceTask {
        transport::task_from_lambda_event_with_hint(event)
    }
}

fn discard(task: &mut InferenceTask, message: String) {
    tracing::warn!(task_id = %task.id(), status = 400, "Discarding task");
    if let Err(err) = task.discard(StatusCode::BAD_REQUEST, message) {
        tracing::error!(error = %err, "Failed to discard task");
    }
}

/// Payload text for a discard message, cut to at most `limit` bytes.
fn echo(payload: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Builder for [`DataframeInput`].
///
/// Nothing is validated until [`build`](Self::build).
pub struct DataframeInputBuilder {
    typ: String,
    orient: Option<String>,
    columns: Option<Vec<String>>,
    dtype: Option<DtypeSpec>,
    echo_limit: usize,
    decoder: Arc<dyn FrameDecoder>,
}

impl std::fmt::Debug for DataframeInputBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataframeInputBuilder")
            .field("typ", &self.typ)
            .field("orient", &self.orient)
            .field("columns", &self.columns)
            .field("dtype", &self.dtype)
            .field("echo_limit", &self.echo_limit)
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

impl Default for DataframeInputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataframeInputBuilder {
    /// Creates a builder using the built-in [`TabularDecoder`].
    pub fn new() -> Self {
        let defaults = DataframeInputConfig::default();
        Self {
            typ: defaults.typ,
            orient: None,
            columns: None,
            dtype: None,
            echo_limit: defaults.echo_limit,
            decoder: Arc::new(TabularDecoder),
        }
    }

    /// Decoding mode. Only `"frame"` builds.
    pub fn typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = typ.into();
        self
    }

    /// JSON orient: split, records, index, columns or values.
    pub fn orient(mut self, orient: impl Into<String>) -> Self {
        self.orient = Some(orient.into());
        self
    }

    /// Expected column names.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declared column types.
    pub fn dtype(mut self, dtype: DtypeSpec) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Bytes of an offending payload echoed in discard messages.
    pub fn echo_limit(mut self, limit: usize) -> Self {
        self.echo_limit = limit;
        self
    }

    /// Replaces the per-payload decoder.
    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Validates the settings and builds the adapter.
    pub fn build(self) -> Result<DataframeInput, AdapterError> {
        if let Some(format) = Format::ALL
            .into_iter()
            .find(|format| !self.decoder.supports(*format))
        {
            return Err(AdapterError::MissingDecoder {
                adapter: DATAFRAME_INPUT_NAME,
                format,
            });
        }

        if self.typ != TYP_FRAME {
            return Err(AdapterError::UnsupportedType { typ: self.typ });
        }

        let orient = self.orient.as_deref().map(str::parse::<Orient>).transpose()?;

        if let Some(columns) = &self.columns {
            check_unique(columns)?;
        }

        let columns = match (&self.columns, &self.dtype) {
            (Some(columns), Some(dtype)) => {
                check_columns(columns, dtype)?;
                Some(columns.clone())
            },
            (Some(columns), None) => Some(columns.clone()),
            (None, Some(DtypeSpec::ByName(map))) => Some(map.keys().cloned().collect()),
            (None, _) => None,
        };

        let decoder = BatchDecoder::new(self.decoder)
            .with_orient(orient)
            .with_columns(columns.clone())
            .with_types(self.dtype.as_ref().map(DeclaredTypes::from));

        tracing::debug!(
            adapter = DATAFRAME_INPUT_NAME,
            orient = ?orient,
            columns = ?columns,
            "Built adapter"
        );

        Ok(DataframeInput {
            typ: self.typ,
            orient,
            columns,
            dtype: self.dtype,
            echo_limit: self.echo_limit,
            sniffer: FormatSniffer::new(),
            decoder,
        })
    }
}

fn check_unique(columns: &[String]) -> Result<(), AdapterError> {
    let mut seen = IndexSet::with_capacity(columns.len());
    match columns.iter().find(|column| !seen.insert(column.as_str())) {
        Some(column) => Err(AdapterError::DuplicateColumn {
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// Declared columns and a by-name dtype must name the same set of fields; a
/// positional dtype must have one entry per column.
fn check_columns(columns: &[String], dtype: &DtypeSpec) -> Result<(), AdapterError> {
    let declared: IndexSet<&str> = columns.iter().map(String::as_str).collect();
    let matches = match dtype {
        DtypeSpec::ByName(map) => {
            map.keys().map(String::as_str).collect::<IndexSet<_>>() == declared
        },
        DtypeSpec::ByPosition(list) => list.len() == declared.len(),
    };
    if matches {
        Ok(())
    } else {
        Err(AdapterError::ColumnTypeMismatch {
            columns: columns.to_vec(),
            dtype: dtype.to_named().into_keys().collect(),
        })
    }
}
