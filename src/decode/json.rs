//! JSON payloads, shaped by an [`Orient`].

use indexmap::IndexSet;
use serde_json::{Map, Value};

use super::DecodeError;
use crate::frame::{Row, StructuredBatch};
use crate::types::format::Orient;

/// Guesses the orient of a document when none is configured.
///
/// A list of objects is `records`, any other list is `values`, an object
/// holding exactly `columns` and `data` (plus optionally `index`) is `split`,
/// and every other object is `columns`.
///
/// # Examples
///
/// ```
/// use infer_adapters::decode::json::guess_orient;
/// use infer_adapters::Orient;
/// use serde_json::json;
///
/// assert_eq!(guess_orient(&json!([{"a": 1}])), Orient::Records);
/// assert_eq!(guess_orient(&json!([[1, 2]])), Orient::Values);
/// assert_eq!(guess_orient(&json!({"columns": ["a"], "data": [[1]]})), Orient::Split);
/// assert_eq!(guess_orient(&json!({"a": {"0": 1}})), Orient::Columns);
/// ```
pub fn guess_orient(doc: &Value) -> Orient {
    match doc {
        Value::Array(items) => match items.first() {
            Some(Value::Object(_)) => Orient::Records,
            _ => Orient::Values,
        },
        Value::Object(map) if is_split_shape(map) => Orient::Split,
        _ => Orient::Columns,
    }
}

fn is_split_shape(map: &Map<String, Value>) -> bool {
    let has = |key: &str| map.contains_key(key);
    has("columns")
        && has("data")
        && map
            .keys()
            .all(|k| matches!(k.as_str(), "columns" | "data" | "index"))
}

/// Decodes one JSON payload into rows.
///
/// With `orient == None` the orient is guessed per payload.
pub fn decode_json(payload: &[u8], orient: Option<Orient>) -> Result<StructuredBatch, DecodeError> {
    let doc: Value = serde_json::from_slice(payload)?;
    let orient = orient.unwrap_or_else(|| guess_orient(&doc));
    match orient {
        Orient::Split => from_split(doc),
        Orient::Records => from_records(doc),
        Orient::Index => from_index(doc),
        Orient::Columns => from_columns(doc),
        Orient::Values => from_values(doc),
    }
}

fn shape(orient: Orient, expected: &'static str) -> DecodeError {
    DecodeError::Shape { orient, expected }
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn from_split(doc: Value) -> Result<StructuredBatch, DecodeError> {
    let expected = "an object with 'columns' and 'data' arrays";
    let Value::Object(mut map) = doc else {
        return Err(shape(Orient::Split, expected));
    };
    let Some(Value::Array(columns)) = map.remove("columns") else {
        return Err(shape(Orient::Split, expected));
    };
    let Some(Value::Array(data)) = map.remove("data") else {
        return Err(shape(Orient::Split, expected));
    };

    let columns: Vec<String> = columns.iter().map(label).collect();
    let mut batch = StructuredBatch::new(unique_columns(columns)?);
    for row in data {
        let Value::Array(values) = row else {
            return Err(shape(Orient::Split, "'data' to be an array of arrays"));
        };
        if values.len() != batch.columns().len() {
            return Err(shape(
                Orient::Split,
                "every 'data' row to have one value per column",
            ));
        }
        batch.push_values(values);
    }
    Ok(batch)
}

fn from_records(doc: Value) -> Result<StructuredBatch, DecodeError> {
    let Value::Array(items) = doc else {
        return Err(shape(Orient::Records, "an array of objects"));
    };
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(record) = item else {
            return Err(shape(Orient::Records, "an array of objects"));
        };
        rows.push(record);
    }
    Ok(from_objects(rows))
}

fn from_index(doc: Value) -> Result<StructuredBatch, DecodeError> {
    let Value::Object(map) = doc else {
        return Err(shape(Orient::Index, "an object of row objects"));
    };
    let mut rows = Vec::with_capacity(map.len());
    for (_, item) in map {
        let Value::Object(record) = item else {
            return Err(shape(Orient::Index, "an object of row objects"));
        };
        rows.push(record);
    }
    Ok(from_objects(rows))
}

fn from_columns(doc: Value) -> Result<StructuredBatch, DecodeError> {
    let expected = "an object of column objects";
    let Value::Object(map) = doc else {
        return Err(shape(Orient::Columns, expected));
    };

    let mut index: IndexSet<String> = IndexSet::new();
    let mut columns = Vec::with_capacity(map.len());
    for (name, cells) in map {
        let Value::Object(cells) = cells else {
            return Err(shape(Orient::Columns, expected));
        };
        index.extend(cells.keys().cloned());
        columns.push((name, cells));
    }

    let names = columns.iter().map(|(name, _)| name.clone()).collect();
    let mut batch = StructuredBatch::new(names);
    for idx in &index {
        let values = columns
            .iter()
            .map(|(_, cells)| cells.get(idx).cloned().unwrap_or(Value::Null))
            .collect();
        batch.push_values(values);
    }
    Ok(batch)
}

fn from_values(doc: Value) -> Result<StructuredBatch, DecodeError> {
    let Value::Array(items) = doc else {
        return Err(shape(Orient::Values, "an array of value arrays"));
    };
    let rows: Vec<Vec<Value>> = items
        .into_iter()
        .map(|item| match item {
            Value::Array(values) => values,
            scalar => vec![scalar],
        })
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut batch = StructuredBatch::new((0..width).map(|i| i.to_string()).collect());
    for values in rows {
        batch.push_values(values);
    }
    Ok(batch)
}

/// Rows from objects; the header is the union of keys in first-seen order.
fn from_objects(records: Vec<Map<String, Value>>) -> StructuredBatch {
    let mut header: IndexSet<String> = IndexSet::new();
    for record in &records {
        header.extend(record.keys().cloned());
    }
    let mut batch = StructuredBatch::new(header.into_iter().collect());
    for record in records {
        batch.push_row(record.into_iter().collect::<Row>());
    }
    batch
}

pub(super) fn unique_columns(columns: Vec<String>) -> Result<Vec<String>, DecodeError> {
    let mut seen = IndexSet::with_capacity(columns.len());
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(DecodeError::DuplicateColumn {
                column: column.clone(),
            });
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(doc: Value, orient: Option<Orient>) -> Result<StructuredBatch, DecodeError> {
        decode_json(doc.to_string().as_bytes(), orient)
    }

    #[test]
    fn records_union_columns() {
        let batch = decode(json!([{"a": 1}, {"b": 2, "a": 3}]), Some(Orient::Records)).unwrap();
        assert_eq!(batch.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(batch.column("a"), vec![json!(1), json!(3)]);
        assert_eq!(batch.column("b"), vec![json!(null), json!(2)]);
    }

    #[test]
    fn columns_orient_rows_follow_index_order() {
        let batch = decode(
            json!({"a": {"r2": 1, "r1": 2}, "b": {"r1": "x", "r2": "y"}}),
            Some(Orient::Columns),
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.column("a"), vec![json!(1), json!(2)]);
        assert_eq!(batch.column("b"), vec![json!("y"), json!("x")]);
    }

    #[test]
    fn columns_orient_rejects_scalars() {
        let err = decode(json!({"a": 1}), Some(Orient::Columns)).unwrap_err();
        assert!(matches!(err, DecodeError::Shape { orient: Orient::Columns, .. }));
    }

    #[test]
    fn index_orient() {
        let batch = decode(json!({"0": {"a": 1}, "1": {"a": 2}}), Some(Orient::Index)).unwrap();
        assert_eq!(batch.column("a"), vec![json!(1), json!(2)]);
    }

    #[test]
    fn split_orient_checks_width() {
        let ok = decode(
            json!({"index": [0], "columns": ["a", "b"], "data": [[1, 2]]}),
            Some(Orient::Split),
        )
        .unwrap();
        assert_eq!(ok.column("b"), vec![json!(2)]);

        let err = decode(
            json!({"columns": ["a", "b"], "data": [[1]]}),
            Some(Orient::Split),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Shape { .. }));
    }

    #[test]
    fn split_orient_rejects_duplicate_columns() {
        let err = decode(
            json!({"columns": ["a", "a"], "data": [[1, 2]]}),
            Some(Orient::Split),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateColumn { .. }));
    }

    #[test]
    fn values_orient_pads_ragged_rows() {
        let batch = decode(json!([[1, 2], [3]]), Some(Orient::Values)).unwrap();
        assert_eq!(batch.columns(), &["0".to_string(), "1".to_string()]);
        assert_eq!(batch.column("1"), vec![json!(2), json!(null)]);
    }

    #[test]
    fn guessed_orient_is_used_when_unset() {
        let batch = decode(json!([{"a": 1}, {"a": 2}]), None).unwrap();
        assert_eq!(batch.len(), 2);
        let batch = decode(json!({"a": {"0": 1}}), None).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn configured_orient_wins_over_shape() {
        let err = decode(json!([{"a": 1}]), Some(Orient::Columns)).unwrap_err();
        assert!(matches!(err, DecodeError::Shape { .. }));
    }

    #[test]
    fn invalid_json() {
        let err = decode_json(b"{not json", None).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
}
