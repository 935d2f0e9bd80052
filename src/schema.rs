//! Request body description for API documentation.
//!
//! The description is metadata only. Nothing here is checked on the wire.

use serde_json::{json, Map, Value};

use crate::constants::{CONTENT_TYPE_CSV, CONTENT_TYPE_JSON, CONTENT_TYPE_MULTIPART};
use crate::types::dtype::{DtypeSpec, SemanticType};

/// Describes the accepted request bodies from declared columns and types.
///
/// # Examples
///
/// ```
/// use infer_adapters::{DtypeSpec, SchemaDescriptor};
/// use serde_json::json;
///
/// let dtype: DtypeSpec = [("age", "int64"), ("name", "str")].into_iter().collect();
/// let doc = SchemaDescriptor::new(None, Some(dtype)).describe();
///
/// assert_eq!(
///     doc["application/json"]["schema"]["properties"]["age"],
///     json!({"type": "array", "items": {"type": "integer"}})
/// );
/// assert_eq!(doc["text/csv"]["schema"]["format"], "binary");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDescriptor {
    columns: Option<Vec<String>>,
    dtype: Option<DtypeSpec>,
}

impl SchemaDescriptor {
    /// Creates a descriptor.
    pub fn new(columns: Option<Vec<String>>, dtype: Option<DtypeSpec>) -> Self {
        Self { columns, dtype }
    }

    /// Semantic type per described field, in declaration order.
    ///
    /// Positional types take the declared column names when there are as
    /// many, and their positions otherwise.
    pub fn fields(&self) -> Vec<(String, Option<SemanticType>)> {
        match (&self.dtype, &self.columns) {
            (Some(DtypeSpec::ByPosition(types)), Some(columns)) if columns.len() == types.len() => {
                columns
                    .iter()
                    .zip(types)
                    .map(|(col, ty)| (col.clone(), Some(SemanticType::from_type_name(ty))))
                    .collect()
            },
            (Some(dtype), _) => dtype
                .to_named()
                .into_iter()
                .map(|(col, ty)| (col, Some(SemanticType::from_type_name(&ty))))
                .collect(),
            (None, Some(columns)) => columns.iter().map(|col| (col.clone(), None)).collect(),
            (None, None) => Vec::new(),
        }
    }

    /// Schema document keyed by content type.
    pub fn describe(&self) -> Value {
        let fields = self.fields();
        let json_schema = if fields.is_empty() {
            json!({"type": "object"})
        } else {
            let properties: Map<String, Value> = fields
                .into_iter()
                .map(|(name, ty)| {
                    let column = match ty {
                        Some(ty) => json!({"type": "array", "items": {"type": ty.as_str()}}),
                        None => json!({"type": "array"}),
                    };
                    (name, column)
                })
                .collect();
            json!({"type": "object", "properties": properties})
        };

        json!({
            CONTENT_TYPE_MULTIPART: {
                "schema": {
                    "type": "object",
                    "properties": {"file": {"type": "string", "format": "binary"}},
                },
            },
            CONTENT_TYPE_JSON: {"schema": json_schema},
            CONTENT_TYPE_CSV: {"schema": {"type": "string", "format": "binary"}},
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("int32", "integer" ; "int prefix")]
    #[test_case("float64", "number" ; "float prefix")]
    #[test_case("double", "number" ; "double prefix")]
    #[test_case("string", "string" ; "str prefix")]
    #[test_case("datetime64[ns]", "string" ; "date prefix")]
    #[test_case("boolean", "boolean" ; "bool prefix")]
    #[test_case("category", "object" ; "fallback")]
    fn type_buckets(type_name: &str, expected: &str) {
        let dtype: DtypeSpec = [("x", type_name)].into_iter().collect();
        let doc = SchemaDescriptor::new(None, Some(dtype)).describe();
        assert_eq!(
            doc["application/json"]["schema"]["properties"]["x"]["items"]["type"],
            expected
        );
    }

    #[test]
    fn untyped_json_body() {
        let doc = SchemaDescriptor::default().describe();
        assert_eq!(doc["application/json"]["schema"], json!({"type": "object"}));
        assert_eq!(
            doc["multipart/form-data"]["schema"]["properties"]["file"],
            json!({"type": "string", "format": "binary"})
        );
    }

    #[test]
    fn positional_types_use_column_names() {
        let descriptor = SchemaDescriptor::new(
            Some(vec!["a".to_string(), "b".to_string()]),
            Some(DtypeSpec::ByPosition(vec!["int".to_string(), "str".to_string()])),
        );
        assert_eq!(
            descriptor.fields(),
            vec![
                ("a".to_string(), Some(SemanticType::Integer)),
                ("b".to_string(), Some(SemanticType::String)),
            ]
        );
    }

    #[test]
    fn positional_types_without_columns_use_positions() {
        let descriptor =
            SchemaDescriptor::new(None, Some(DtypeSpec::ByPosition(vec!["bool".to_string()])));
        assert_eq!(
            descriptor.fields(),
            vec![("0".to_string(), Some(SemanticType::Boolean))]
        );
    }

    #[test]
    fn columns_without_types() {
        let doc = SchemaDescriptor::new(Some(vec!["a".to_string()]), None).describe();
        assert_eq!(
            doc["application/json"]["schema"]["properties"]["a"],
            json!({"type": "array"})
        );
    }

    #[test]
    fn describe_is_pure() {
        let descriptor = SchemaDescriptor::new(None, Some([("a", "int")].into_iter().collect()));
        assert_eq!(descriptor.describe(), descriptor.describe());
    }
}
