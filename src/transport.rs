//! Task construction for the supported transports.
//!
//! Every inbound request becomes exactly one [`InferenceTask`], except on the
//! command line where each input becomes its own task. A request that cannot
//! be read is still turned into a task, already discarded with 400, so the
//! serving layer reports it like any other failure.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use base64::Engine;
use bytes::Bytes;
use clap::{Args, Parser};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use multer::Multipart;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTENT_TYPE_CSV, CONTENT_TYPE_MULTIPART, LAMBDA_CSV_FILENAME, LAMBDA_JSON_FILENAME,
};
use crate::types::headers::TransportMetadata;
use crate::types::task::InferenceTask;

/// An HTTP request as seen by an adapter.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Request headers.
    pub headers: HeaderMap,
    /// Full request body.
    pub body: Bytes,
}

impl HttpRequest {
    /// Creates a request from headers and body.
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }
}

impl From<http::Request<Bytes>> for HttpRequest {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            headers: parts.headers,
            body,
        }
    }
}

/// An API Gateway proxy event delivered to a Lambda function.
///
/// # Examples
///
/// ```
/// use infer_adapters::transport::LambdaEvent;
///
/// let event: LambdaEvent = serde_json::from_str(
///     r#"{"headers": {"Content-Type": "text/csv"}, "body": "a\n1\n"}"#,
/// ).unwrap();
/// assert_eq!(event.body.as_deref(), Some("a\n1\n"));
/// assert!(!event.is_base64_encoded);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LambdaEvent {
    /// Request headers.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether `body` holds base64 of the raw bytes.
    #[serde(default, rename = "isBase64Encoded")]
    pub is_base64_encoded: bool,
}

/// Builds a task from an HTTP request.
///
/// The body is the payload, except for `multipart/form-data` requests where
/// the first file part is the payload and its filename the hint. A multipart
/// request that is malformed or has no file part yields a discarded task.
pub async fn task_from_http_request(request: HttpRequest) -> InferenceTask {
    let metadata = TransportMetadata::new().with_headers(request.headers);
    if metadata.content_type().as_deref() != Some(CONTENT_TYPE_MULTIPART) {
        return InferenceTask::new(request.body, metadata);
    }

    match first_file_part(&metadata, request.body.clone()).await {
        Ok(Some(part)) => {
            let mut file_metadata = TransportMetadata::new().with_filename(part.filename);
            if let Some(content_type) = &part.content_type {
                file_metadata = file_metadata.with_content_type(content_type);
            }
            InferenceTask::new(part.content, file_metadata)
        },
        Ok(None) => rejected(
            InferenceTask::new(request.body, metadata),
            "Multipart request contains no file part".to_string(),
        ),
        Err(err) => rejected(
            InferenceTask::new(request.body, metadata),
            format!("Malformed multipart request: {err}"),
        ),
    }
}

/// Builds a task from a Lambda event, keeping only its headers and body.
pub fn task_from_lambda_event(event: LambdaEvent) -> InferenceTask {
    let headers = lambda_headers(event.headers.unwrap_or_default());
    let metadata = TransportMetadata::new().with_headers(headers);
    lambda_task(event.body, event.is_base64_encoded, metadata)
}

/// Builds a task from a Lambda event with a filename hint derived from the
/// declared content type: `input.csv` for CSV, `input.json` otherwise.
pub fn task_from_lambda_event_with_hint(event: LambdaEvent) -> InferenceTask {
    let headers = lambda_headers(event.headers.unwrap_or_default());
    let metadata = TransportMetadata::new().with_headers(headers);
    let filename = if metadata.content_type().as_deref() == Some(CONTENT_TYPE_CSV) {
        LAMBDA_CSV_FILENAME
    } else {
        LAMBDA_JSON_FILENAME
    };
    lambda_task(
        event.body,
        event.is_base64_encoded,
        metadata.with_filename(filename),
    )
}

fn lambda_task(body: Option<String>, base64: bool, metadata: TransportMetadata) -> InferenceTask {
    let body = body.unwrap_or_default();
    if !base64 {
        return InferenceTask::new(body, metadata);
    }
    match base64::prelude::BASE64_STANDARD.decode(body.as_bytes()) {
        Ok(bytes) => InferenceTask::new(bytes, metadata),
        Err(err) => rejected(
            InferenceTask::new(body, metadata),
            format!("Request body is not valid base64: {err}"),
        ),
    }
}

fn lambda_headers(raw: HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for (name, value) in raw {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            },
            _ => tracing::debug!(header = %name, "Skipping illegal Lambda header"),
        }
    }
    headers
}

/// Inputs given on the command line.
///
/// Flatten into a `clap` command to accept `--input <text>...` and
/// `--input-file <path>...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct CliInputs {
    /// Inline payloads, one input each
    #[arg(long, num_args = 1..)]
    pub input: Vec<String>,

    /// Payload files, one input each
    #[arg(long, num_args = 1..)]
    pub input_file: Vec<PathBuf>,
}

impl CliInputs {
    /// Returns `true` when no input was given.
    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.input_file.is_empty()
    }
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct CliInputArgs {
    #[command(flatten)]
    inputs: CliInputs,
}

/// Parses command-line arguments and builds one task per input.
///
/// Inline inputs come first, then files, each in the order given. A value
/// starting with `--` must use the `--input=<value>` form.
///
/// # Examples
///
/// ```
/// use infer_adapters::transport::tasks_from_cli;
///
/// let args: Vec<String> = ["--input", r#"[{"a": 1}]"#, r#"[{"a": 2}]"#]
///     .iter()
///     .map(|s| s.to_string())
///     .collect();
/// let tasks = tasks_from_cli(&args).unwrap();
/// assert_eq!(tasks.len(), 2);
///
/// assert!(tasks_from_cli(&["--verbose".to_string()]).is_err());
/// ```
pub fn tasks_from_cli(args: &[String]) -> Result<Vec<InferenceTask>, clap::Error> {
    let parsed = CliInputArgs::try_parse_from(args)?;
    Ok(tasks_from_inputs(&parsed.inputs))
}

/// Builds one task per parsed input. A file that cannot be read yields a
/// discarded task.
pub fn tasks_from_inputs(inputs: &CliInputs) -> Vec<InferenceTask> {
    inputs
        .input
        .iter()
        .map(|text| InferenceTask::new(text.clone(), TransportMetadata::new()))
        .chain(inputs.input_file.iter().map(|path| file_task(path)))
        .collect()
}

fn file_task(path: &Path) -> InferenceTask {
    let metadata = TransportMetadata::new().with_filename(path.to_string_lossy());
    match std::fs::read(path) {
        Ok(content) => InferenceTask::new(content, metadata),
        Err(err) => rejected(
            InferenceTask::new(Bytes::new(), metadata),
            format!("Failed to read input file '{}': {err}", path.display()),
        ),
    }
}

fn rejected(mut task: InferenceTask, message: String) -> InferenceTask {
    tracing::warn!(task_id = %task.id(), reason = %message, "Rejecting request");
    if let Err(err) = task.discard(StatusCode::BAD_REQUEST, message) {
        tracing::error!(error = %err, "Failed to discard task");
    }
    task
}

struct FilePart {
    filename: String,
    content_type: Option<String>,
    content: Bytes,
}

/// First part of a multipart body that carries a filename.
async fn first_file_part(
    metadata: &TransportMetadata,
    body: Bytes,
) -> Result<Option<FilePart>, multer::Error> {
    let content_type = metadata
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(content_type)?;

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = Multipart::new(stream, boundary);
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(ToString::to_string);
        let content = field.bytes().await?;
        return Ok(Some(FilePart {
            filename,
            content_type,
            content,
        }));
    }
    Ok(None)
}
