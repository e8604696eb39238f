//! Pipeline configuration
//!
//! Every stage receives the configuration explicitly. Values not present in
//! a JSON config file fall back to [`PipelineConfig::default`].

use crate::completion::PairScope;
use crate::data::SalesColumns;
use crate::error::{HtsError, Result};
use crate::forecast::RetryPolicy;
use crate::models::ForecasterSpec;
use crate::reconcile::{ReconciliationMethod, Reconciler};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the constant root column added during preparation
pub const TOTAL_COLUMN: &str = "total";
/// Value of the root column
pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw daily sales file
    pub source_path: PathBuf,
    /// Dense training table written by `prep`
    pub prep_path: PathBuf,
    /// Directory of the training artifacts
    pub model_dir: PathBuf,
    /// Directory receiving timestamped prediction files
    pub output_dir: PathBuf,
    pub columns: SalesColumns,
    /// Grouping columns, root first
    pub hierarchy: Vec<String>,
    pub horizon: usize,
    pub season_length: usize,
    /// Minimum number of periods with positive sales for a pair to be kept;
    /// `None` requires every period present in the data
    pub min_positive_periods: Option<usize>,
    pub pair_scope: PairScope,
    pub method: ReconciliationMethod,
    pub nonnegative: bool,
    pub model: ForecasterSpec,
    /// Retries of transient per-series forecast failures
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            source_path: PathBuf::from("/data/raw.csv"),
            prep_path: PathBuf::from("/data/prep.csv"),
            model_dir: PathBuf::from("/model"),
            output_dir: PathBuf::from("/data"),
            columns: SalesColumns::default(),
            hierarchy: vec![
                TOTAL_COLUMN.to_string(),
                "shop_id".to_string(),
                "item_id".to_string(),
            ],
            horizon: 30,
            season_length: 30,
            min_positive_periods: None,
            pair_scope: PairScope::default(),
            method: ReconciliationMethod::default(),
            nonnegative: true,
            model: ForecasterSpec::default(),
            max_retries: retry.max_retries,
            retry_delay_ms: retry.delay_ms,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Keep the default paths but read and write everything under `root`
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            source_path: root.join("raw.csv"),
            prep_path: root.join("prep.csv"),
            model_dir: root.join("model"),
            output_dir: root.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hierarchy.is_empty() {
            return Err(HtsError::InvalidParameter(
                "hierarchy must name at least one column".to_string(),
            ));
        }
        if self.hierarchy.first().map(String::as_str) != Some(TOTAL_COLUMN) {
            return Err(HtsError::InvalidParameter(format!(
                "hierarchy must start with the '{}' column",
                TOTAL_COLUMN
            )));
        }
        if self.horizon == 0 {
            return Err(HtsError::InvalidParameter(
                "horizon must be at least 1".to_string(),
            ));
        }
        if self.season_length == 0 {
            return Err(HtsError::InvalidParameter(
                "season_length must be at least 1".to_string(),
            ));
        }
        if self.min_positive_periods == Some(0) {
            return Err(HtsError::InvalidParameter(
                "min_positive_periods must be at least 1 when set".to_string(),
            ));
        }
        if let ForecasterSpec::WindowAverage { window: 0 } = self.model {
            return Err(HtsError::InvalidParameter(
                "window_average needs a positive window".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay_ms: self.retry_delay_ms,
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.method, self.nonnegative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.horizon, 30);
        assert_eq!(config.hierarchy, vec!["total", "shop_id", "item_id"]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"horizon": 7, "method": "wls_struct"}"#).unwrap();
        assert_eq!(config.horizon, 7);
        assert_eq!(config.method, ReconciliationMethod::WlsStruct);
        assert_eq!(config.season_length, 30);
        assert!(config.nonnegative);
    }

    #[test]
    fn test_validate_rejects_zero_horizon() {
        let config = PipelineConfig {
            horizon: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HtsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validate_requires_total_root() {
        let config = PipelineConfig {
            hierarchy: vec!["shop_id".to_string(), "item_id".to_string()],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
