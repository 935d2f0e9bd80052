//! Payload formats and JSON orients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Format of a raw payload, as decided by the sniffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON document, shaped according to an [`Orient`].
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

impl Format {
    /// Every format the sniffer can produce.
    pub const ALL: [Format; 2] = [Format::Json, Format::Csv];
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// How a JSON document maps onto rows and columns.
///
/// ```text
/// split    {"index": [...], "columns": [...], "data": [[...], ...]}
/// records  [{col: val, ...}, ...]
/// index    {idx: {col: val, ...}, ...}
/// columns  {col: {idx: val, ...}, ...}
/// values   [[...], ...]
/// ```
///
/// # Examples
///
/// ```
/// use infer_adapters::Orient;
///
/// let orient: Orient = "records".parse().unwrap();
/// assert_eq!(orient, Orient::Records);
/// assert!("table".parse::<Orient>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orient {
    /// Labels and values kept apart.
    Split,
    /// One object per row.
    Records,
    /// Rows keyed by index label.
    Index,
    /// Columns keyed by name, each mapping index label to value.
    Columns,
    /// Bare value matrix without labels.
    Values,
}

impl Orient {
    /// The enumerated set of orients, in documentation order.
    pub const ALL: [Orient; 5] = [
        Orient::Split,
        Orient::Records,
        Orient::Index,
        Orient::Columns,
        Orient::Values,
    ];

    /// Name used in configuration and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Records => "records",
            Self::Index => "index",
            Self::Columns => "columns",
            Self::Values => "values",
        }
    }
}

impl fmt::Display for Orient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orient {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|orient| orient.as_str() == s)
            .ok_or_else(|| AdapterError::InvalidOrient {
                orient: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient_parse_display_agree() {
        for orient in Orient::ALL {
            assert_eq!(orient.to_string().parse::<Orient>().unwrap(), orient);
        }
    }

    #[test]
    fn orient_parse_is_case_sensitive() {
        assert!("Records".parse::<Orient>().is_err());
    }

    #[test]
    fn orient_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Orient::Columns).unwrap(), "columns");
        assert_eq!(serde_json::to_value(Format::Csv).unwrap(), "csv");
    }
}
