//! Trailing window average forecaster

use crate::error::{HtsError, Result};
use crate::models::{check_history, Forecaster, History, SeriesForecast};

/// Flat forecast at the mean of the last `window` observations
#[derive(Debug, Clone)]
pub struct WindowAverage {
    /// Name of the model
    name: String,
    /// Window size
    window: usize,
}

impl WindowAverage {
    /// Create a new window average model
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(HtsError::InvalidParameter(
                "Window size must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("WindowAverage{}", window),
            window,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// One-step-ahead averages over the trailing window; the first point
    /// has no past and reuses the observation itself
    fn fitted(&self, values: &[f64]) -> Vec<f64> {
        let mut fitted = Vec::with_capacity(values.len());
        for t in 0..values.len() {
            if t == 0 {
                fitted.push(values[0]);
            } else {
                let start = t.saturating_sub(self.window);
                let past = &values[start..t];
                fitted.push(past.iter().sum::<f64>() / past.len() as f64);
            }
        }
        fitted
    }
}

impl Forecaster for WindowAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn forecast(
        &self,
        series_id: &str,
        history: History<'_>,
        horizon: usize,
        _season_length: usize,
    ) -> Result<SeriesForecast> {
        check_history(series_id, &history)?;
        let values = history.values;
        if values.len() < self.window {
            return Err(HtsError::ForecastingError {
                series_id: series_id.to_string(),
                message: format!(
                    "need at least {} observations, got {}",
                    self.window,
                    values.len()
                ),
            });
        }

        let last_average =
            values[values.len() - self.window..].iter().sum::<f64>() / self.window as f64;

        Ok(SeriesForecast::new(vec![last_average; horizon], horizon)?.with_fitted(self.fitted(values)))
    }
}
