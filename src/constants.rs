//! Content types, file extensions and other fixed strings shared by the
//! transports and the adapter.

/// Content type selecting the CSV decoder.
pub const CONTENT_TYPE_CSV: &str = "text/csv";

/// Content type selecting the JSON decoder.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type of file-upload requests.
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";

/// File extensions recognised as CSV when no content type is declared.
///
/// Matched case-insensitively.
pub const CSV_EXTENSIONS: &[&str] = &[".csv"];

/// Filename hint given to Lambda payloads declared as CSV.
pub const LAMBDA_CSV_FILENAME: &str = "input.csv";

/// Filename hint given to all other Lambda payloads.
pub const LAMBDA_JSON_FILENAME: &str = "input.json";

/// Name reported in discard messages produced by the dataframe adapter.
pub const DATAFRAME_INPUT_NAME: &str = "DataframeInput";

/// The only decoding mode currently implemented.
pub const TYP_FRAME: &str = "frame";

/// Declared but unsupported decoding mode.
pub const TYP_SERIES: &str = "series";

/// Default number of payload bytes echoed back in per-task discard messages.
pub const DEFAULT_ECHO_LIMIT: usize = 256;

/// Prefix of environment variables overriding adapter configuration.
pub const ENV_PREFIX: &str = "INFER_ADAPTERS_";

/// Default configuration file looked up by
/// [`DataframeInputConfig::load`](crate::adapter::DataframeInputConfig::load).
pub const DEFAULT_CONFIG_FILE: &str = ".infer-adapters.toml";

/// Default upper bound on the number of tasks merged into one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 2000;

/// Default time a batching front end may wait to fill a batch.
pub const DEFAULT_MAX_LATENCY_MS: u64 = 10_000;
