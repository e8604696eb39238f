//! Automatic exponential smoothing model selection

use crate::error::{HtsError, Result};
use crate::models::{check_history, Forecaster, History, SeriesForecast};
use hts_math::smoothing::one_step_predictions;
use hts_math::{Smoother, SmoothingKind};
use tracing::debug;

const LEVEL_GRID: [f64; 7] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9];
const HOLT_LEVEL_GRID: [f64; 3] = [0.1, 0.3, 0.5];
const TREND_GRID: [f64; 3] = [0.05, 0.1, 0.2];
const SEASONAL_LEVEL_GRID: [f64; 3] = [0.05, 0.1, 0.3];
const SEASON_GRID: [f64; 3] = [0.05, 0.1, 0.3];

/// Exponential smoothing with automatic model selection
///
/// Candidates are simple smoothing, Holt's linear trend and additive
/// seasonal smoothing (only when the history spans two full seasons), each
/// over a small parameter grid. The candidate with the lowest AIC on
/// one-step-ahead in-sample errors wins.
#[derive(Debug, Clone)]
pub struct AutoEts {
    name: String,
}

impl Default for AutoEts {
    fn default() -> Self {
        Self::new()
    }
}

struct Candidate {
    kind: SmoothingKind,
    smoother: Box<dyn Smoother>,
    predictions: Vec<Option<f64>>,
    score: f64,
}

impl AutoEts {
    pub fn new() -> Self {
        Self {
            name: "AutoETS".to_string(),
        }
    }

    fn candidates(n: usize, season_length: usize) -> Vec<SmoothingKind> {
        if n < 3 {
            return vec![SmoothingKind::Simple { alpha: 0.5 }];
        }

        let mut kinds: Vec<SmoothingKind> = LEVEL_GRID
            .iter()
            .map(|&alpha| SmoothingKind::Simple { alpha })
            .collect();
        for &alpha in &HOLT_LEVEL_GRID {
            for &beta in &TREND_GRID {
                kinds.push(SmoothingKind::Holt { alpha, beta });
            }
        }
        if season_length >= 2 && n >= 2 * season_length {
            for &alpha in &SEASONAL_LEVEL_GRID {
                for &gamma in &SEASON_GRID {
                    kinds.push(SmoothingKind::Seasonal {
                        alpha,
                        gamma,
                        season_length,
                    });
                }
            }
        }
        kinds
    }

    fn evaluate(kind: SmoothingKind, values: &[f64], warmup: usize) -> Result<Candidate> {
        let mut smoother = kind.build()?;
        let predictions = one_step_predictions(smoother.as_mut(), values)?;

        let errors: Vec<f64> = predictions
            .iter()
            .zip(values)
            .skip(warmup)
            .filter_map(|(p, y)| p.map(|p| y - p))
            .collect();

        let score = if errors.is_empty() {
            0.0
        } else {
            let n = errors.len() as f64;
            let sse: f64 = errors.iter().map(|e| e * e).sum();
            n * (sse / n + f64::EPSILON).ln() + 2.0 * (smoother.parameter_count() + 1) as f64
        };

        Ok(Candidate {
            kind,
            smoother,
            predictions,
            score,
        })
    }
}

impl Forecaster for AutoEts {
    fn name(&self) -> &str {
        &self.name
    }

    fn forecast(
        &self,
        series_id: &str,
        history: History<'_>,
        horizon: usize,
        season_length: usize,
    ) -> Result<SeriesForecast> {
        check_history(series_id, &history)?;
        let values = history.values;

        let kinds = Self::candidates(values.len(), season_length);
        // compare every candidate on the same evaluation window
        let warmup = kinds
            .iter()
            .map(|k| match k {
                SmoothingKind::Seasonal { season_length, .. } => *season_length,
                SmoothingKind::Holt { .. } => 2,
                SmoothingKind::Simple { .. } => 1,
            })
            .max()
            .unwrap_or(1);

        let mut best: Option<Candidate> = None;
        for kind in kinds {
            let candidate = Self::evaluate(kind, values, warmup)?;
            if best.as_ref().map_or(true, |b| candidate.score < b.score) {
                best = Some(candidate);
            }
        }
        let best = best.ok_or_else(|| HtsError::ForecastingError {
            series_id: series_id.to_string(),
            message: "no smoothing candidate could be fitted".to_string(),
        })?;

        let forecasts = (1..=horizon)
            .map(|step| best.smoother.forecast(step))
            .collect::<hts_math::Result<Vec<f64>>>()?;
        if forecasts.iter().any(|v| !v.is_finite()) {
            return Err(HtsError::ForecastingError {
                series_id: series_id.to_string(),
                message: format!("non-finite forecast from {:?}", best.kind),
            });
        }

        // warm-up steps fall back to the previous observation
        let fitted: Vec<f64> = best
            .predictions
            .iter()
            .enumerate()
            .map(|(t, p)| p.unwrap_or_else(|| values[t.saturating_sub(1)]))
            .collect();

        debug!(series_id, model = ?best.kind, score = best.score, "selected smoothing model");

        Ok(SeriesForecast::new(forecasts, horizon)?.with_fitted(fitted))
    }
}
