//! Declared column types.
//!
//! Type names are free-form strings such as `"int64"`, `"float32"` or
//! `"datetime64[ns]"`. They are bucketed into a small set of semantic types
//! by prefix, which drives both value conversion and the request schema.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Semantic bucket of a declared type name.
///
/// # Examples
///
/// ```
/// use infer_adapters::SemanticType;
///
/// assert_eq!(SemanticType::from_type_name("int64"), SemanticType::Integer);
/// assert_eq!(SemanticType::from_type_name("double"), SemanticType::Number);
/// assert_eq!(SemanticType::from_type_name("datetime64"), SemanticType::String);
/// assert_eq!(SemanticType::from_type_name("category"), SemanticType::Object);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// `int*`
    Integer,
    /// `float*` and `double*`
    Number,
    /// `str*` and `date*`
    String,
    /// `bool*`
    Boolean,
    /// Anything else.
    Object,
}

impl SemanticType {
    /// Buckets a type name by prefix. The match is case-sensitive.
    pub fn from_type_name(name: &str) -> Self {
        if name.starts_with("int") {
            Self::Integer
        } else if name.starts_with("float") || name.starts_with("double") {
            Self::Number
        } else if name.starts_with("str") || name.starts_with("date") {
            Self::String
        } else if name.starts_with("bool") {
            Self::Boolean
        } else {
            Self::Object
        }
    }

    /// JSON-schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }

    /// Converts a decoded cell to this type.
    ///
    /// Nulls pass through unchanged. Returns `None` when the value cannot be
    /// represented.
    pub fn convert(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            Self::Integer => to_integer(value),
            Self::Number => to_number(value),
            Self::String => to_text(value),
            Self::Boolean => to_boolean(value),
            Self::Object => Some(value.clone()),
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(Value::from(f as i64))
            } else {
                None
            }
        },
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // NaN and infinities have no JSON representation.
    Some(Number::from_f64(f).map_or(Value::Null, Value::Number))
}

fn to_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        other => Some(Value::String(other.to_string())),
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_f64()? {
            f if f == 0.0 => Some(Value::Bool(false)),
            f if f == 1.0 => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Declared types as configured: by column name, or by column position.
///
/// A positional list names the type of the column at position `i` of each
/// decoded payload, whatever that column is called.
///
/// # Examples
///
/// ```
/// use infer_adapters::DtypeSpec;
///
/// let spec: DtypeSpec = serde_json::from_str(r#"["int", "str"]"#).unwrap();
/// let named = spec.to_named();
/// assert_eq!(named.get("0").map(String::as_str), Some("int"));
/// assert_eq!(named.get("1").map(String::as_str), Some("str"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DtypeSpec {
    /// Column name to type name.
    ByName(IndexMap<String, String>),
    /// Type name per column position.
    ByPosition(Vec<String>),
}

impl DtypeSpec {
    /// Returns `true` for the name-keyed form.
    pub fn is_by_name(&self) -> bool {
        matches!(self, Self::ByName(_))
    }

    /// Column label to type name, positional entries keyed by their index.
    pub fn to_named(&self) -> IndexMap<String, String> {
        match self {
            Self::ByName(map) => map.clone(),
            Self::ByPosition(list) => list
                .iter()
                .enumerate()
                .map(|(i, name)| (i.to_string(), name.clone()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DtypeSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::ByName(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
