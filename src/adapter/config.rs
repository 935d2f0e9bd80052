//! Adapter configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`.infer-adapters.toml`)
//! 2. Environment variables (with `INFER_ADAPTERS_` prefix)
//!
//! Environment variables override TOML configuration. Values are only
//! validated when the configuration is turned into an adapter with
//! [`DataframeInput::from_config`](super::DataframeInput::from_config).
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [dataframe_input]
//! typ = "frame"
//! orient = "records"
//! columns = ["col1", "col2"]
//! echo_limit = 128
//!
//! [dataframe_input.dtype]
//! col1 = "int64"
//! col2 = "str"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONFIG_FILE, DEFAULT_ECHO_LIMIT, ENV_PREFIX, TYP_FRAME};
use crate::types::dtype::DtypeSpec;

/// Configuration of a [`DataframeInput`](super::DataframeInput).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataframeInputConfig {
    /// Decoding mode. Only `"frame"` is supported.
    pub typ: String,

    /// JSON orient. `None` guesses the orient per payload.
    pub orient: Option<String>,

    /// Expected column names.
    pub columns: Option<Vec<String>>,

    /// Declared column types, by name or by position.
    #[serde(alias = "input_dtypes")]
    pub dtype: Option<DtypeSpec>,

    /// Bytes of an offending payload echoed in discard messages (0 = none).
    pub echo_limit: usize,
}

impl Default for DataframeInputConfig {
    fn default() -> Self {
        Self {
            typ: TYP_FRAME.to_string(),
            orient: None,
            columns: None,
            dtype: None,
            echo_limit: DEFAULT_ECHO_LIMIT,
        }
    }
}

impl DataframeInputConfig {
    /// Load configuration from the default file and the environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML configuration file
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(contents) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            dataframe_input: DataframeInputConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(full.dataframe_input)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup.
    ///
    /// `lookup` receives full variable names such as `INFER_ADAPTERS_ORIENT`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(typ) = var("TYP") {
            self.typ = typ;
        }

        if let Some(orient) = var("ORIENT") {
            self.orient = if orient.is_empty() { None } else { Some(orient) };
        }

        // Comma-separated list
        if let Some(columns) = var("COLUMNS") {
            let columns: Vec<String> = columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            self.columns = if columns.is_empty() { None } else { Some(columns) };
        }

        if let Some(limit) = var("ECHO_LIMIT") {
            if let Ok(v) = limit.parse() {
                self.echo_limit = v;
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading configuration file.
    Io {
        /// Path to the configuration file.
        path: String,
        /// Error message.
        error: String,
    },
    /// Parse error in configuration.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, error } => {
                write!(f, "Failed to read config file '{path}': {error}")
            },
            Self::Parse(e) => write!(f, "Failed to parse config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DataframeInputConfig::default();

        assert_eq!(config.typ, "frame");
        assert!(config.orient.is_none());
        assert!(config.columns.is_none());
        assert!(config.dtype.is_none());
        assert_eq!(config.echo_limit, 256);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [dataframe_input]
            orient = "records"
            columns = ["col1", "col2"]
            echo_limit = 16

            [dataframe_input.dtype]
            col1 = "int"
            col2 = "str"
        "#;

        let config = DataframeInputConfig::from_toml(toml).unwrap();

        assert_eq!(config.typ, "frame");
        assert_eq!(config.orient.as_deref(), Some("records"));
        assert_eq!(
            config.columns,
            Some(vec!["col1".to_string(), "col2".to_string()])
        );
        assert_eq!(config.echo_limit, 16);
        let dtype = config.dtype.unwrap().to_named();
        assert_eq!(dtype.get("col1").map(String::as_str), Some("int"));
    }

    #[test]
    fn test_positional_dtype_and_alias() {
        let toml = r#"
            [dataframe_input]
            input_dtypes = ["int", "float"]
        "#;

        let config = DataframeInputConfig::from_toml(toml).unwrap();
        assert_eq!(
            config.dtype,
            Some(DtypeSpec::ByPosition(vec![
                "int".to_string(),
                "float".to_string()
            ]))
        );
    }

    #[test]
    fn test_missing_section_is_default() {
        let config = DataframeInputConfig::from_toml("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, DataframeInputConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = DataframeInputConfig::from_toml("[dataframe_input\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INFER_ADAPTERS_ORIENT", "split"),
            ("INFER_ADAPTERS_COLUMNS", "a, b,,c"),
            ("INFER_ADAPTERS_ECHO_LIMIT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = DataframeInputConfig {
            echo_limit: 8,
            ..Default::default()
        };
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.orient.as_deref(), Some("split"));
        assert_eq!(
            config.columns,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        // Unparseable values are ignored
        assert_eq!(config.echo_limit, 8);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dataframe_input]\norient = \"values\"").unwrap();

        let config = DataframeInputConfig::from_file(file.path()).unwrap();
        assert_eq!(config.orient.as_deref(), Some("values"));
    }

    #[test]
    fn test_from_missing_file() {
        let err = DataframeInputConfig::from_file("/nonexistent/infer.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/infer.toml"));
    }
}
