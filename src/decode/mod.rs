//! Payload decoding and batch merging.
//!
//! # Architecture
//!
//! Decoding has two layers:
//!
//! 1. **[`FrameDecoder`]** -- turns one payload of a known [`Format`] into a
//!    row group. [`TabularDecoder`] is the built-in implementation; adapters
//!    receive a decoder by injection so an unusable one is rejected at
//!    construction time.
//!
//! 2. **[`BatchDecoder`]** -- runs a `FrameDecoder` over every payload of a
//!    group, applies the declared columns and types, and concatenates the
//!    surviving row groups in input order.
//!
//! A payload that fails at any step contributes zero rows and does not affect
//! the others. Only when no payload survives is the merged batch absent.

pub mod delimited;
pub mod json;

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::frame::StructuredBatch;
use crate::types::dtype::{DtypeSpec, SemanticType};
use crate::types::format::{Format, Orient};

/// Why one payload could not contribute rows.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not valid CSV.
    #[error("invalid CSV: {0}")]
    Csv(#[from] ::csv::Error),

    /// The JSON document does not have the shape the orient requires.
    #[error("JSON document does not match orient '{orient}': expected {expected}")]
    Shape {
        /// Orient used to read the document.
        orient: Orient,
        /// Description of the expected shape.
        expected: &'static str,
    },

    /// Two columns share a name.
    #[error("duplicate column '{column}'")]
    DuplicateColumn {
        /// The repeated name.
        column: String,
    },

    /// Declared columns are absent from the payload.
    #[error("missing declared columns {missing:?}")]
    MissingColumns {
        /// Declared columns not found.
        missing: Vec<String>,
    },

    /// The payload's columns differ from the columns of the batch.
    #[error("columns {found:?} do not match batch columns {expected:?}")]
    ColumnMismatch {
        /// Columns of the batch.
        expected: Vec<String>,
        /// Columns of this payload.
        found: Vec<String>,
    },

    /// A cell cannot be converted to its declared type.
    #[error("column '{column}' value {value} is not a valid {expected}")]
    TypeMismatch {
        /// Column holding the cell.
        column: String,
        /// Declared type.
        expected: SemanticType,
        /// Offending value, JSON-encoded.
        value: String,
    },

    /// The payload holds no rows.
    #[error("payload contains no rows")]
    Empty,

    /// The decoder does not handle this format.
    #[error("no decoder for {0} payloads")]
    Unsupported(Format),
}

/// Decodes a single payload of a known format.
///
/// Implementations are shared across concurrent `extract` calls and must not
/// keep per-request state.
pub trait FrameDecoder: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Returns `true` if [`decode`](Self::decode) handles `format`.
    fn supports(&self, format: Format) -> bool;

    /// Decodes one payload.
    ///
    /// `orient` applies to JSON payloads only; `None` lets the decoder guess.
    fn decode(
        &self,
        payload: &[u8],
        format: Format,
        orient: Option<Orient>,
    ) -> Result<StructuredBatch, DecodeError>;
}

/// Built-in decoder for JSON and CSV payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularDecoder;

impl FrameDecoder for TabularDecoder {
    fn name(&self) -> &str {
        "tabular"
    }

    fn supports(&self, format: Format) -> bool {
        matches!(format, Format::Json | Format::Csv)
    }

    fn decode(
        &self,
        payload: &[u8],
        format: Format,
        orient: Option<Orient>,
    ) -> Result<StructuredBatch, DecodeError> {
        match format {
            Format::Json => json::decode_json(payload, orient),
            Format::Csv => delimited::decode_csv(payload),
        }
    }
}

/// Declared types resolved to semantic types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredTypes {
    /// Types keyed by column name.
    ByName(IndexMap<String, SemanticType>),
    /// Type of the column at each position.
    ByPosition(Vec<SemanticType>),
}

impl From<&DtypeSpec> for DeclaredTypes {
    fn from(spec: &DtypeSpec) -> Self {
        match spec {
            DtypeSpec::ByName(map) => Self::ByName(
                map.iter()
                    .map(|(col, name)| (col.clone(), SemanticType::from_type_name(name)))
                    .collect(),
            ),
            DtypeSpec::ByPosition(list) => Self::ByPosition(
                list.iter()
                    .map(|name| SemanticType::from_type_name(name))
                    .collect(),
            ),
        }
    }
}

/// Result of decoding one group of payloads.
#[derive(Debug)]
pub struct BatchDecodeOutput {
    /// Merged rows, or `None` when no payload contributed any.
    pub batch: Option<StructuredBatch>,
    /// Rows contributed by each payload, in input order; `0` on failure.
    pub row_counts: Vec<usize>,
    /// Failure of each payload that contributed nothing, by input position.
    pub errors: Vec<(usize, DecodeError)>,
}

/// Decodes a group of payloads and merges them into one batch.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use infer_adapters::{BatchDecoder, Format, TabularDecoder};
///
/// let decoder = BatchDecoder::new(Arc::new(TabularDecoder));
/// let output = decoder.decode(
///     &[b"a\n1\n2\n".as_slice(), b"oops".as_slice(), br#"[{"a": 3}]"#.as_slice()],
///     &[Format::Csv, Format::Json, Format::Json],
/// );
///
/// assert_eq!(output.row_counts, vec![2, 0, 1]);
/// assert_eq!(output.batch.unwrap().len(), 3);
/// ```
#[derive(Clone)]
pub struct BatchDecoder {
    decoder: Arc<dyn FrameDecoder>,
    orient: Option<Orient>,
    columns: Option<Vec<String>>,
    types: Option<DeclaredTypes>,
}

impl std::fmt::Debug for BatchDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDecoder")
            .field("decoder", &self.decoder.name())
            .field("orient", &self.orient)
            .field("columns", &self.columns)
            .field("types", &self.types)
            .finish()
    }
}

impl BatchDecoder {
    /// Creates a decoder with no orient, columns or types declared.
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            orient: None,
            columns: None,
            types: None,
        }
    }

    /// Reads every JSON payload with `orient` instead of guessing.
    pub fn with_orient(mut self, orient: Option<Orient>) -> Self {
        self.orient = orient;
        self
    }

    /// Projects every payload onto `columns`.
    pub fn with_columns(mut self, columns: Option<Vec<String>>) -> Self {
        self.columns = columns;
        self
    }

    /// Converts cells to the declared types.
    pub fn with_types(mut self, types: Option<DeclaredTypes>) -> Self {
        self.types = types;
        self
    }

    /// The injected per-payload decoder.
    pub fn frame_decoder(&self) -> &Arc<dyn FrameDecoder> {
        &self.decoder
    }

    /// Decodes `payloads[i]` as `formats[i]` and merges the results.
    ///
    /// Row order is stable: payload `i`'s rows form one contiguous range in
    /// input order, whatever order the payloads finish decoding in.
    pub fn decode<P: AsRef<[u8]> + Sync>(
        &self,
        payloads: &[P],
        formats: &[Format],
    ) -> BatchDecodeOutput {
        debug_assert_eq!(payloads.len(), formats.len());
        let groups = self.decode_all(payloads, formats);

        let mut merged: Option<StructuredBatch> = None;
        let mut row_counts = Vec::with_capacity(groups.len());
        let mut errors = Vec::new();

        for (position, group) in groups.into_iter().enumerate() {
            let group = group.and_then(|group| match &merged {
                Some(batch) if self.columns.is_none() => same_columns(batch, group),
                _ => Ok(group),
            });
            match group {
                Ok(group) => {
                    row_counts.push(group.len());
                    match merged.as_mut() {
                        Some(batch) => batch.append(group),
                        None => merged = Some(group),
                    }
                },
                Err(err) => {
                    tracing::debug!(position, error = %err, "Payload contributed no rows");
                    row_counts.push(0);
                    errors.push((position, err));
                },
            }
        }

        BatchDecodeOutput {
            batch: merged,
            row_counts,
            errors,
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn decode_all<P: AsRef<[u8]> + Sync>(
        &self,
        payloads: &[P],
        formats: &[Format],
    ) -> Vec<Result<StructuredBatch, DecodeError>> {
        payloads
            .iter()
            .zip(formats)
            .map(|(payload, format)| self.decode_one(payload.as_ref(), *format))
            .collect()
    }

    #[cfg(feature = "rayon")]
    fn decode_all<P: AsRef<[u8]> + Sync>(
        &self,
        payloads: &[P],
        formats: &[Format],
    ) -> Vec<Result<StructuredBatch, DecodeError>> {
        use rayon::prelude::*;

        // Indexed collect keeps input order.
        payloads
            .par_iter()
            .zip(formats.par_iter())
            .map(|(payload, format)| self.decode_one(payload.as_ref(), *format))
            .collect()
    }

    fn decode_one(&self, payload: &[u8], format: Format) -> Result<StructuredBatch, DecodeError> {
        if !self.decoder.supports(format) {
            return Err(DecodeError::Unsupported(format));
        }
        let mut group = self.decoder.decode(payload, format, self.orient)?;
        if let Some(columns) = &self.columns {
            group = project(group, columns)?;
        }
        if let Some(types) = &self.types {
            group = convert(group, types)?;
        }
        if group.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(group)
    }
}

fn project(group: StructuredBatch, columns: &[String]) -> Result<StructuredBatch, DecodeError> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|col| !group.columns().contains(*col))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(DecodeError::MissingColumns { missing });
    }
    let mut projected = StructuredBatch::new(columns.to_vec());
    for row in group.into_rows() {
        projected.push_row(row);
    }
    Ok(projected)
}

fn convert(group: StructuredBatch, types: &DeclaredTypes) -> Result<StructuredBatch, DecodeError> {
    let typed_columns: Vec<(String, SemanticType)> = match types {
        DeclaredTypes::ByName(map) => map
            .iter()
            .filter(|(col, _)| group.columns().contains(*col))
            .map(|(col, ty)| (col.clone(), *ty))
            .collect(),
        DeclaredTypes::ByPosition(list) => group
            .columns()
            .iter()
            .cloned()
            .zip(list.iter().copied())
            .collect(),
    };

    let mut converted = StructuredBatch::new(group.columns().to_vec());
    for mut row in group.into_rows() {
        for (column, ty) in &typed_columns {
            if let Some(cell) = row.get_mut(column) {
                let value = ty.convert(cell).ok_or_else(|| DecodeError::TypeMismatch {
                    column: column.clone(),
                    expected: *ty,
                    value: cell.to_string(),
                })?;
                *cell = value;
            }
        }
        converted.push_row(row);
    }
    Ok(converted)
}

fn same_columns(
    batch: &StructuredBatch,
    group: StructuredBatch,
) -> Result<StructuredBatch, DecodeError> {
    let matches = batch.columns().len() == group.columns().len()
        && group.columns().iter().all(|col| batch.columns().contains(col));
    if matches {
        Ok(group)
    } else {
        Err(DecodeError::ColumnMismatch {
            expected: batch.columns().to_vec(),
            found: group.columns().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decoder() -> BatchDecoder {
        BatchDecoder::new(Arc::new(TabularDecoder))
    }

    #[test]
    fn partial_failure_keeps_others_in_order() {
        let output = decoder().decode(
            &[
                br#"[{"x": 1}]"#.as_slice(),
                b"{broken".as_slice(),
                br#"[{"x": 2}, {"x": 3}]"#.as_slice(),
            ],
            &[Format::Json, Format::Json, Format::Json],
        );
        assert_eq!(output.row_counts, vec![1, 0, 2]);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].0, 1);
        let batch = output.batch.unwrap();
        assert_eq!(batch.column("x"), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn total_failure_has_no_batch() {
        let output = decoder().decode(
            &[b"nope".as_slice(), b"a,b\n1\n".as_slice()],
            &[Format::Json, Format::Csv],
        );
        assert!(output.batch.is_none());
        assert_eq!(output.row_counts, vec![0, 0]);
        assert_eq!(output.errors.len(), 2);
    }

    #[test]
    fn empty_group() {
        let output = decoder().decode::<&[u8]>(&[], &[]);
        assert!(output.batch.is_none());
        assert!(output.row_counts.is_empty());
    }

    #[test]
    fn mixed_formats_share_header() {
        let output = decoder().decode(
            &[b"a,b\n1,2\n".as_slice(), br#"[{"b": 4, "a": 3}]"#.as_slice()],
            &[Format::Csv, Format::Json],
        );
        assert_eq!(output.row_counts, vec![1, 1]);
        let batch = output.batch.unwrap();
        assert_eq!(batch.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(batch.column("a"), vec![json!(1), json!(3)]);
    }

    #[test]
    fn undeclared_header_mismatch_fails_payload() {
        let output = decoder().decode(
            &[b"a\n1\n".as_slice(), b"b\n2\n".as_slice()],
            &[Format::Csv, Format::Csv],
        );
        assert_eq!(output.row_counts, vec![1, 0]);
        assert!(matches!(
            output.errors[0].1,
            DecodeError::ColumnMismatch { .. }
        ));
    }

    #[test]
    fn declared_columns_project_and_require() {
        let output = decoder()
            .with_columns(Some(vec!["a".to_string()]))
            .decode(
                &[b"a,extra\n1,2\n".as_slice(), b"b\n2\n".as_slice()],
                &[Format::Csv, Format::Csv],
            );
        assert_eq!(output.row_counts, vec![1, 0]);
        assert!(matches!(
            output.errors[0].1,
            DecodeError::MissingColumns { .. }
        ));
        let batch = output.batch.unwrap();
        assert_eq!(batch.columns(), &["a".to_string()]);
    }

    #[test]
    fn declared_types_convert_or_fail() {
        let types = DeclaredTypes::from(&[("a", "int")].into_iter().collect::<DtypeSpec>());
        let output = decoder().with_types(Some(types)).decode(
            &[br#"[{"a": "7"}]"#.as_slice(), br#"[{"a": "seven"}]"#.as_slice()],
            &[Format::Json, Format::Json],
        );
        assert_eq!(output.row_counts, vec![1, 0]);
        assert!(matches!(
            output.errors[0].1,
            DecodeError::TypeMismatch { .. }
        ));
        assert_eq!(output.batch.unwrap().column("a"), vec![json!(7)]);
    }

    #[test]
    fn positional_types_apply_by_position() {
        let types = DeclaredTypes::from(&DtypeSpec::ByPosition(vec![
            "str".to_string(),
            "float".to_string(),
        ]));
        let output = decoder()
            .with_types(Some(types))
            .decode(&[b"id,score\n1,2\n".as_slice()], &[Format::Csv]);
        let batch = output.batch.unwrap();
        assert_eq!(batch.column("id"), vec![json!("1")]);
        assert_eq!(batch.column("score"), vec![json!(2.0)]);
    }

    #[test]
    fn zero_row_payload_counts_as_failure() {
        let output = decoder().decode(
            &[b"[]".as_slice(), br#"[{"a": 1}]"#.as_slice()],
            &[Format::Json, Format::Json],
        );
        assert_eq!(output.row_counts, vec![0, 1]);
        assert!(matches!(output.errors[0].1, DecodeError::Empty));
    }

    #[test]
    fn orient_applies_to_json_only() {
        let output = decoder().with_orient(Some(Orient::Values)).decode(
            &[b"[[1, 2]]".as_slice(), b"0,1\n3,4\n".as_slice()],
            &[Format::Json, Format::Csv],
        );
        assert_eq!(output.row_counts, vec![1, 1]);
        assert_eq!(output.batch.unwrap().column("0"), vec![json!(1), json!(3)]);
    }

    struct JsonOnly;

    impl FrameDecoder for JsonOnly {
        fn name(&self) -> &str {
            "json-only"
        }
        fn supports(&self, format: Format) -> bool {
            format == Format::Json
        }
        fn decode(
            &self,
            payload: &[u8],
            _format: Format,
            orient: Option<Orient>,
        ) -> Result<StructuredBatch, DecodeError> {
            json::decode_json(payload, orient)
        }
    }

    /// Payload `i` carries `i % 7` rows valued `i`; every tenth payload is broken.
    fn uneven_payloads(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| match i % 10 {
                3 => "{broken".to_string(),
                _ => {
                    let rows: Vec<_> = (0..i % 7).map(|_| json!({"x": i})).collect();
                    serde_json::to_string(&rows).unwrap()
                },
            })
            .collect()
    }

    fn assert_input_order(output: &BatchDecodeOutput, payloads: &[String]) {
        let mut expected = Vec::new();
        for (i, (payload, rows)) in payloads.iter().zip(&output.row_counts).enumerate() {
            let wanted = if payload.starts_with('{') { 0 } else { i % 7 };
            assert_eq!(*rows, wanted, "row count of payload {i}");
            expected.extend(std::iter::repeat(json!(i)).take(*rows));
        }
        assert_eq!(output.batch.as_ref().unwrap().column("x"), expected);
        // Errors are reported in input order too
        let positions: Vec<_> = output.errors.iter().map(|(pos, _)| *pos).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn many_uneven_payloads_keep_input_order() {
        let payloads = uneven_payloads(200);
        let formats = vec![Format::Json; payloads.len()];
        let output = decoder().decode(&payloads, &formats);
        assert_input_order(&output, &payloads);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_decode_keeps_input_order() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let payloads = uneven_payloads(1_000);
        let formats = vec![Format::Json; payloads.len()];
        for _ in 0..5 {
            let output = pool.install(|| decoder().decode(&payloads, &formats));
            assert_input_order(&output, &payloads);
        }
    }

    #[test]
    fn unsupported_format_fails_payload() {
        let output = BatchDecoder::new(Arc::new(JsonOnly))
            .decode(&[b"a\n1\n".as_slice()], &[Format::Csv]);
        assert!(output.batch.is_none());
        assert!(matches!(
            output.errors[0].1,
            DecodeError::Unsupported(Format::Csv)
        ));
    }
}
