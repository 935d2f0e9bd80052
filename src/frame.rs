//! The merged tabular batch handed to a prediction function.
//!
//! A [`StructuredBatch`] is an ordered sequence of rows sharing one column
//! list. Rows contributed by one payload are contiguous and stay in
//! submission order, so a vectorised prediction result can be split back
//! per request with [`row_ranges`].

use std::ops::Range;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::format::Orient;

/// One row: column name to cell value, in column order.
pub type Row = IndexMap<String, Value>;

/// Ordered rows sharing one column list.
///
/// # Examples
///
/// ```
/// use infer_adapters::{Orient, StructuredBatch};
/// use serde_json::json;
///
/// let mut batch = StructuredBatch::new(vec!["a".to_string(), "b".to_string()]);
/// batch.push_values(vec![json!(1), json!("x")]);
/// batch.push_values(vec![json!(2), json!("y")]);
///
/// assert_eq!(batch.len(), 2);
/// assert_eq!(
///     batch.to_json(Orient::Columns),
///     json!({"a": {"0": 1, "1": 2}, "b": {"0": "x", "1": "y"}})
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredBatch {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl StructuredBatch {
    /// Creates an empty batch with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the batch, returning its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Rows in `range`, or `None` if the range is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Option<&[Row]> {
        self.rows.get(range)
    }

    /// Cells of one column, top to bottom. Missing cells read as null.
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Appends a row, filling absent columns with null and dropping fields
    /// outside the header.
    pub fn push_row(&mut self, mut row: Row) {
        let normalized = self
            .columns
            .iter()
            .map(|col| {
                let value = row.swap_remove(col).unwrap_or(Value::Null);
                (col.clone(), value)
            })
            .collect();
        self.rows.push(normalized);
    }

    /// Appends a row given positionally. Short rows are padded with null,
    /// extra values are dropped.
    pub fn push_values(&mut self, values: Vec<Value>) {
        let mut values = values.into_iter();
        let row = self
            .columns
            .iter()
            .map(|col| (col.clone(), values.next().unwrap_or(Value::Null)))
            .collect();
        self.rows.push(row);
    }

    /// Moves every row of `other` to the end of this batch.
    ///
    /// `other` is re-keyed onto this batch's header.
    pub fn append(&mut self, other: StructuredBatch) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        for row in other.rows {
            self.push_row(row);
        }
    }

    /// Encodes the batch as JSON in the given orient.
    ///
    /// Index labels are the row positions `0..len`.
    pub fn to_json(&self, orient: Orient) -> Value {
        match orient {
            Orient::Split => {
                let mut doc = Map::new();
                doc.insert(
                    "index".to_string(),
                    Value::Array((0..self.rows.len()).map(Value::from).collect()),
                );
                doc.insert(
                    "columns".to_string(),
                    Value::Array(self.columns.iter().cloned().map(Value::String).collect()),
                );
                doc.insert("data".to_string(), self.values_matrix());
                Value::Object(doc)
            },
            Orient::Records => Value::Array(
                self.rows
                    .iter()
                    .map(|row| Value::Object(self.row_object(row)))
                    .collect(),
            ),
            Orient::Index => Value::Object(
                self.rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| (i.to_string(), Value::Object(self.row_object(row))))
                    .collect(),
            ),
            Orient::Columns => Value::Object(
                self.columns
                    .iter()
                    .map(|col| {
                        let cells = self
                            .rows
                            .iter()
                            .enumerate()
                            .map(|(i, row)| {
                                (i.to_string(), row.get(col).cloned().unwrap_or(Value::Null))
                            })
                            .collect();
                        (col.clone(), Value::Object(cells))
                    })
                    .collect(),
            ),
            Orient::Values => self.values_matrix(),
        }
    }

    fn row_object(&self, row: &Row) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|col| (col.clone(), row.get(col).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    fn values_matrix(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    Value::Array(
                        self.columns
                            .iter()
                            .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// Contiguous row range of each payload in a merged batch.
///
/// Payload `i` owns `[sum(counts[..i]), sum(counts[..i]) + counts[i])`; a
/// zero count yields an empty range.
///
/// # Examples
///
/// ```
/// use infer_adapters::frame::row_ranges;
///
/// assert_eq!(row_ranges(&[2, 0, 3]), vec![0..2, 2..2, 2..5]);
/// ```
pub fn row_ranges(counts: &[usize]) -> Vec<Range<usize>> {
    let mut start = 0;
    counts
        .iter()
        .map(|&count| {
            let range = start..start + count;
            start += count;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> StructuredBatch {
        let mut batch = StructuredBatch::new(vec!["a".to_string(), "b".to_string()]);
        batch.push_values(vec![json!(1), json!("x")]);
        batch.push_values(vec![json!(2), json!("y")]);
        batch
    }

    #[test]
    fn split_orient() {
        assert_eq!(
            sample().to_json(Orient::Split),
            json!({
                "index": [0, 1],
                "columns": ["a", "b"],
                "data": [[1, "x"], [2, "y"]]
            })
        );
    }

    #[test]
    fn records_orient() {
        assert_eq!(
            sample().to_json(Orient::Records),
            json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}])
        );
    }

    #[test]
    fn index_orient() {
        assert_eq!(
            sample().to_json(Orient::Index),
            json!({"0": {"a": 1, "b": "x"}, "1": {"a": 2, "b": "y"}})
        );
    }

    #[test]
    fn values_orient() {
        assert_eq!(
            sample().to_json(Orient::Values),
            json!([[1, "x"], [2, "y"]])
        );
    }

    #[test]
    fn push_row_normalizes_to_header() {
        let mut batch = StructuredBatch::new(vec!["a".to_string(), "b".to_string()]);
        let mut row = Row::new();
        row.insert("b".to_string(), json!(5));
        row.insert("z".to_string(), json!(9));
        batch.push_row(row);

        let keys: Vec<_> = batch.row(0).unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(batch.column("a"), vec![json!(null)]);
        assert_eq!(batch.column("b"), vec![json!(5)]);
    }

    #[test]
    fn append_into_empty_takes_header() {
        let mut merged = StructuredBatch::default();
        merged.append(sample());
        merged.append(sample());
        assert_eq!(merged.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.column("a"), vec![json!(1), json!(2), json!(1), json!(2)]);
    }

    #[test]
    fn slice_bounds() {
        let batch = sample();
        assert_eq!(batch.slice(1..2).map(<[Row]>::len), Some(1));
        assert!(batch.slice(1..5).is_none());
    }

    #[test]
    fn ranges_are_contiguous() {
        assert_eq!(row_ranges(&[]), Vec::<Range<usize>>::new());
        assert_eq!(row_ranges(&[0, 0]), vec![0..0, 0..0]);
        assert_eq!(row_ranges(&[1, 4]), vec![0..1, 1..5]);
    }
}
