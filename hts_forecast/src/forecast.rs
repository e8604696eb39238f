//! Independent forecasts for every series of the hierarchy
//!
//! This is the pipeline's only parallel stage: each aggregated series is one
//! unit of work on the rayon pool. Any failure aborts the whole stage, since
//! reconciliation needs a forecast for every row.

use crate::error::{HtsError, Result};
use crate::hierarchy::AggregatedSeries;
use crate::keys::SeriesKey;
use crate::models::{Forecaster, History, SeriesForecast};
use crate::utils::future_dates;
use backon::{BlockingRetryable, ConstantBuilder};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Per-series retry of transient forecaster failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay_ms: 0,
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_max_times(self.max_retries)
    }
}

/// Base (unreconciled) forecasts for all series, rows in hierarchy order
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastMatrix {
    /// Name of the model that produced the forecasts
    pub model: String,
    pub keys: Vec<SeriesKey>,
    /// Dates of the forecast horizon
    pub dates: Vec<NaiveDate>,
    /// `values[i][t]`: forecast of series `i` at horizon step `t`
    pub values: Vec<Vec<f64>>,
    /// In-sample fitted values per series, where the model provides them
    pub fitted: Vec<Option<Vec<f64>>>,
}

impl ForecastMatrix {
    pub fn horizon(&self) -> usize {
        self.dates.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forecasts of one series by key
    pub fn get(&self, key: &SeriesKey) -> Option<&[f64]> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.values[i].as_slice())
    }
}

fn forecast_one(
    forecaster: &dyn Forecaster,
    series_id: &str,
    history: History<'_>,
    horizon: usize,
    season_length: usize,
    retry: &RetryPolicy,
) -> Result<SeriesForecast> {
    let attempt = || forecaster.forecast(series_id, history, horizon, season_length);
    attempt
        .retry(retry.backoff())
        .when(HtsError::is_transient)
        .notify(|err: &HtsError, after: Duration| {
            warn!(series_id, error = %err, retry_in = ?after, "retrying forecast");
        })
        .call()
}

/// Forecast every aggregated series independently
pub fn forecast_hierarchy(
    forecaster: &dyn Forecaster,
    series: &AggregatedSeries,
    horizon: usize,
    season_length: usize,
    retry: &RetryPolicy,
) -> Result<ForecastMatrix> {
    if horizon == 0 {
        return Err(HtsError::InvalidParameter(
            "Forecast horizon must be at least 1".to_string(),
        ));
    }
    let last = *series.calendar.last().ok_or_else(|| {
        HtsError::DataError("Cannot forecast from an empty calendar".to_string())
    })?;

    info!(
        model = forecaster.name(),
        series = series.len(),
        horizon,
        "forecasting all hierarchy levels"
    );

    let results = series
        .keys
        .par_iter()
        .zip(series.values.par_iter())
        .map(|(key, values)| {
            let series_id = key.render();
            let history = History::new(&series.calendar, values)?;
            let forecast = forecast_one(forecaster, &series_id, history, horizon, season_length, retry)?;
            if forecast.horizon() != horizon {
                return Err(HtsError::ForecastingError {
                    series_id,
                    message: format!(
                        "returned {} steps, expected {}",
                        forecast.horizon(),
                        horizon
                    ),
                });
            }
            Ok(forecast.into_parts())
        })
        .collect::<Result<Vec<_>>>()?;

    let (values, fitted): (Vec<Vec<f64>>, Vec<Option<Vec<f64>>>) = results.into_iter().unzip();

    Ok(ForecastMatrix {
        model: forecaster.name().to_string(),
        keys: series.keys.clone(),
        dates: future_dates(last, horizon),
        values,
        fitted,
    })
}
