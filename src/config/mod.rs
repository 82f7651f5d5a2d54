use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::analysis::diagnostics::AdfSettings;
use crate::data::loader::TableSource;
use crate::data::period::Frequency;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("At least one predictor column is required")]
    NoPredictors,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(flatten)]
    pub source: TableSource,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(flatten)]
    pub source: TableSource,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Column present in both tables used to join them. Positional when absent.
    #[serde(default)]
    pub time_index: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub adf: AdfSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub response: ResponseConfig,
    pub predictors: PredictorConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        if config.predictors.columns.is_empty() {
            return Err(ConfigError::NoPredictors);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diagnostics::{AdfRegression, Autolag};

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml(
            r#"
response:
  path: data/crypto.csv
  column: ret
predictors:
  path: data/macro.xlsx
  columns: [cpi, rate]
"#,
        )
        .unwrap();

        assert!(config.response.source.delimiter.is_none());
        assert!(config.predictors.source.sheet.is_none());
        assert!(config.alignment.time_index.is_none());
        assert_eq!(config.alignment.frequency, Frequency::Monthly);
        assert_eq!(config.diagnostics.adf.regression, AdfRegression::Constant);
        assert_eq!(config.diagnostics.adf.autolag, Autolag::Aic);
        assert!(config.diagnostics.adf.max_lag.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(
            r#"
response:
  path: data/crypto.csv
  column: ret
  delimiter: ";"
predictors:
  path: data/macro.xlsx
  sheet: Monthly
  columns: [cpi]
alignment:
  time_index: Date
  frequency: daily
diagnostics:
  adf:
    regression: ct
    autolag: bic
    max_lag: 3
"#,
        )
        .unwrap();

        assert_eq!(config.response.source.delimiter, Some(';'));
        assert_eq!(config.predictors.source.sheet.as_deref(), Some("Monthly"));
        assert_eq!(config.alignment.time_index.as_deref(), Some("Date"));
        assert_eq!(config.alignment.frequency, Frequency::Daily);
        assert_eq!(
            config.diagnostics.adf.regression,
            AdfRegression::ConstantTrend
        );
        assert_eq!(config.diagnostics.adf.autolag, Autolag::Bic);
        assert_eq!(config.diagnostics.adf.max_lag, Some(3));
    }

    #[test]
    fn test_empty_predictors_rejected() {
        let err = Config::from_yaml(
            r#"
response: { path: a.csv, column: y }
predictors: { path: b.csv, columns: [] }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoPredictors));
    }
}
