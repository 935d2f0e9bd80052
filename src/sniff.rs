//! Payload format detection.
//!
//! Rules, first match wins:
//!
//! 1. `Content-Type: text/csv` selects CSV.
//! 2. `Content-Type: application/json` selects JSON.
//! 3. A filename hint ending in a CSV extension selects CSV.
//! 4. Anything else is treated as JSON.
//!
//! Sniffing never fails. Callers that omit the content type get JSON, and a
//! payload that is not really JSON is caught by the decoder.

use crate::constants::{CONTENT_TYPE_CSV, CONTENT_TYPE_JSON, CSV_EXTENSIONS};
use crate::types::format::Format;
use crate::types::headers::TransportMetadata;
use crate::types::task::InferenceTask;

/// Decides which decoder applies to a task.
///
/// # Examples
///
/// ```
/// use infer_adapters::{Format, FormatSniffer, InferenceTask, TransportMetadata};
///
/// let sniffer = FormatSniffer::new();
///
/// let task = InferenceTask::new("a,b\n1,2", TransportMetadata::new().with_filename("data.csv"));
/// assert_eq!(sniffer.sniff(&task), Format::Csv);
///
/// let task = InferenceTask::new("{}", TransportMetadata::new().with_filename("data.txt"));
/// assert_eq!(sniffer.sniff(&task), Format::Json);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatSniffer;

impl FormatSniffer {
    /// Creates a sniffer.
    pub fn new() -> Self {
        Self
    }

    /// Format of a task's payload.
    pub fn sniff(&self, task: &InferenceTask) -> Format {
        self.sniff_metadata(task.metadata())
    }

    /// Format implied by transport metadata alone.
    pub fn sniff_metadata(&self, metadata: &TransportMetadata) -> Format {
        match metadata.content_type().as_deref() {
            Some(CONTENT_TYPE_CSV) => return Format::Csv,
            Some(CONTENT_TYPE_JSON) => return Format::Json,
            _ => {},
        }
        if metadata.filename().is_some_and(has_csv_extension) {
            return Format::Csv;
        }
        Format::Json
    }
}

fn has_csv_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    CSV_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TransportMetadata {
        TransportMetadata::new()
    }

    #[test]
    fn no_metadata_defaults_to_json() {
        assert_eq!(FormatSniffer::new().sniff_metadata(&meta()), Format::Json);
    }

    #[test]
    fn csv_content_type() {
        let m = meta().with_content_type("text/csv; charset=utf-8");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Csv);
    }

    #[test]
    fn json_content_type_beats_csv_filename() {
        let m = meta()
            .with_content_type("application/json")
            .with_filename("data.csv");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Json);
    }

    #[test]
    fn unknown_content_type_falls_back_to_filename() {
        let m = meta()
            .with_content_type("application/octet-stream")
            .with_filename("DATA.CSV");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Csv);
    }

    #[test]
    fn unknown_content_type_without_filename_is_json() {
        let m = meta().with_content_type("text/plain");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Json);
    }

    #[test]
    fn csv_must_be_the_extension() {
        let m = meta().with_filename("data.csv.json");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Json);
        let m = meta().with_filename("csv");
        assert_eq!(FormatSniffer::new().sniff_metadata(&m), Format::Json);
    }
}
