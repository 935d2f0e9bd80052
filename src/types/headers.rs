//! Transport metadata attached to a task.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};

/// Header-like metadata plus an optional filename hint.
///
/// HTTP and Lambda transports fill the headers; file-based transports (CLI,
/// multipart uploads) fill the filename.
///
/// # Examples
///
/// ```
/// use infer_adapters::TransportMetadata;
///
/// let meta = TransportMetadata::new()
///     .with_content_type("Text/CSV; charset=utf-8")
///     .with_filename("batch.csv");
///
/// assert_eq!(meta.content_type().as_deref(), Some("text/csv"));
/// assert_eq!(meta.filename(), Some("batch.csv"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    headers: HeaderMap,
    filename: Option<String>,
}

impl TransportMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `headers` as the request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the `Content-Type` header.
    ///
    /// A value that is not a legal header value is ignored.
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                self.headers.insert(CONTENT_TYPE, value);
            },
            Err(_) => {
                tracing::warn!(content_type, "Ignoring illegal content type header value");
            },
        }
        self
    }

    /// Sets the filename hint.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Filename hint, if any.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The declared media type, lowercased and without parameters.
    ///
    /// `"Application/JSON; charset=utf-8"` becomes `"application/json"`.
    pub fn content_type(&self) -> Option<String> {
        let raw = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let essence = raw.split(';').next().unwrap_or(raw).trim();
        if essence.is_empty() {
            return None;
        }
        Some(essence.to_ascii_lowercase())
    }
}
