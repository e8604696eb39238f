//! Per-series forecasting models
//!
//! The reconciliation core only depends on the [`Forecaster`] trait: given a
//! history and a horizon, produce point forecasts and, when the model can,
//! its in-sample one-step-ahead fitted values.

use crate::error::{HtsError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod auto_ets;
pub mod window_average;

pub use auto_ets::AutoEts;
pub use window_average::WindowAverage;

/// Borrowed view of one series' training history
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pub dates: &'a [NaiveDate],
    pub values: &'a [f64],
}

impl<'a> History<'a> {
    pub fn new(dates: &'a [NaiveDate], values: &'a [f64]) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(HtsError::DataError(format!(
                "History has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Forecast of a single series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    /// Point forecasts, one per horizon step
    values: Vec<f64>,
    /// One-step-ahead in-sample fitted values, aligned with the history
    fitted: Option<Vec<f64>>,
}

impl SeriesForecast {
    /// Create a forecast, checking it covers exactly `horizon` steps
    pub fn new(values: Vec<f64>, horizon: usize) -> Result<Self> {
        if values.len() != horizon {
            return Err(HtsError::InvalidParameter(format!(
                "Values length ({}) doesn't match horizon ({})",
                values.len(),
                horizon
            )));
        }
        Ok(Self {
            values,
            fitted: None,
        })
    }

    /// Attach in-sample fitted values
    pub fn with_fitted(mut self, fitted: Vec<f64>) -> Self {
        self.fitted = Some(fitted);
        self
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    pub fn fitted(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    pub(crate) fn into_parts(self) -> (Vec<f64>, Option<Vec<f64>>) {
        (self.values, self.fitted)
    }

    /// Mean absolute error against actual values
    pub fn mean_absolute_error(&self, actual: &[f64]) -> Result<f64> {
        if self.values.len() != actual.len() || actual.is_empty() {
            return Err(HtsError::InvalidParameter(format!(
                "Forecast length ({}) doesn't match actual length ({})",
                self.values.len(),
                actual.len()
            )));
        }

        let sum: f64 = self
            .values
            .iter()
            .zip(actual.iter())
            .map(|(f, a)| (f - a).abs())
            .sum();

        Ok(sum / self.values.len() as f64)
    }
}

/// Capability interface of a univariate forecaster
///
/// Implementations hold no mutable state, so one instance can serve every
/// series of the hierarchy concurrently.
pub trait Forecaster: Send + Sync + Debug {
    /// Name used for the base forecast column
    fn name(&self) -> &str;

    /// Forecast `horizon` steps after the end of `history`
    fn forecast(
        &self,
        series_id: &str,
        history: History<'_>,
        horizon: usize,
        season_length: usize,
    ) -> Result<SeriesForecast>;
}

/// Serializable model bundle persisted with the training artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ForecasterSpec {
    AutoEts,
    WindowAverage { window: usize },
}

impl Default for ForecasterSpec {
    fn default() -> Self {
        ForecasterSpec::AutoEts
    }
}

impl ForecasterSpec {
    /// Instantiate the described forecaster
    pub fn build(&self) -> Result<Box<dyn Forecaster>> {
        Ok(match self {
            ForecasterSpec::AutoEts => Box::new(AutoEts::new()),
            ForecasterSpec::WindowAverage { window } => Box::new(WindowAverage::new(*window)?),
        })
    }
}

pub(crate) fn check_history(series_id: &str, history: &History<'_>) -> Result<()> {
    if history.is_empty() {
        return Err(HtsError::ForecastingError {
            series_id: series_id.to_string(),
            message: "empty history".to_string(),
        });
    }
    if let Some(pos) = history.values.iter().position(|v| !v.is_finite()) {
        return Err(HtsError::DataError(format!(
            "Series '{}' has a non-finite value at position {}",
            series_id, pos
        )));
    }
    Ok(())
}
