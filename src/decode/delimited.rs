//! CSV payloads.
//!
//! The first record is the header. Every record must have as many fields as
//! the header. Cells are typed by inference: empty cells are null, then
//! integer, float and boolean literals are tried before falling back to text.

use serde_json::{Number, Value};

use super::json::unique_columns;
use super::DecodeError;
use crate::frame::StructuredBatch;

/// Decodes one CSV payload into rows.
pub fn decode_csv(payload: &[u8]) -> Result<StructuredBatch, DecodeError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(payload);

    let header = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if header.iter().all(String::is_empty) {
        return Err(DecodeError::Empty);
    }

    let mut batch = StructuredBatch::new(unique_columns(header)?);
    for record in reader.records() {
        let record = record?;
        batch.push_values(record.iter().map(infer_cell).collect());
    }
    Ok(batch)
}

/// Types a raw CSV cell.
///
/// # Examples
///
/// ```
/// use infer_adapters::decode::delimited::infer_cell;
/// use serde_json::json;
///
/// assert_eq!(infer_cell(""), json!(null));
/// assert_eq!(infer_cell("12"), json!(12));
/// assert_eq!(infer_cell("1.5"), json!(1.5));
/// assert_eq!(infer_cell("True"), json!(true));
/// assert_eq!(infer_cell("abc"), json!("abc"));
/// ```
pub fn infer_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Number::from_f64(f).map_or(Value::Null, Value::Number);
    }
    match raw {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn header_and_rows() {
        let batch = decode_csv(b"a,b\n1,x\n2,\n").unwrap();
        assert_eq!(batch.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(batch.column("a"), vec![json!(1), json!(2)]);
        assert_eq!(batch.column("b"), vec![json!("x"), json!(null)]);
    }

    #[test]
    fn quoted_fields() {
        let batch = decode_csv(b"name,note\n\"Doe, J\",\"said \"\"hi\"\"\"\n").unwrap();
        assert_eq!(batch.column("name"), vec![json!("Doe, J")]);
        assert_eq!(batch.column("note"), vec![json!("said \"hi\"")]);
    }

    #[test]
    fn ragged_rows_fail() {
        let err = decode_csv(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, DecodeError::Csv(_)));
    }

    #[test]
    fn header_only_has_no_rows() {
        let batch = decode_csv(b"a,b\n").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn empty_payload() {
        assert!(matches!(decode_csv(b"").unwrap_err(), DecodeError::Empty));
    }

    #[test]
    fn duplicate_header() {
        let err = decode_csv(b"a,a\n1,2\n").unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateColumn { .. }));
    }

    #[test]
    fn invalid_utf8_fails() {
        let err = decode_csv(b"a\n\xff\xfe\n").unwrap_err();
        assert!(matches!(err, DecodeError::Csv(_)));
    }
}
