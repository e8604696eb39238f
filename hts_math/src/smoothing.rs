//! Exponential smoothing recursions
//!
//! Contains the state-update forms of:
//! - Simple exponential smoothing (level only)
//! - Holt's linear method (level and trend)
//! - Additive seasonal smoothing (level and seasonal profile)
//!
//! Each smoother is fed one observation at a time and can produce an
//! h-step-ahead point forecast from its current state.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Common interface of the recursive smoothers
pub trait Smoother: Send {
    /// Feed the next observation
    fn update(&mut self, value: f64) -> Result<()>;

    /// Point forecast `steps` periods after the last observation (steps >= 1)
    fn forecast(&self, steps: usize) -> Result<f64>;

    /// Whether enough observations were seen to forecast
    fn is_ready(&self) -> bool;

    /// Number of smoothing parameters, used for information criteria
    fn parameter_count(&self) -> usize;

    /// Clear all state
    fn reset(&mut self);
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if value <= 0.0 || value >= 1.0 || !value.is_finite() {
        return Err(MathError::InvalidInput(format!(
            "{} must be between 0 and 1 (exclusive), got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_observation(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(MathError::InvalidInput(format!(
            "Observation must be finite, got {}",
            value
        )));
    }
    Ok(())
}

/// Simple exponential smoothing
#[derive(Debug, Clone)]
pub struct SimpleSmoothing {
    alpha: f64,
    level: Option<f64>,
}

impl SimpleSmoothing {
    /// Create a smoother with the given level smoothing factor
    pub fn new(alpha: f64) -> Result<Self> {
        check_unit_interval("Alpha", alpha)?;
        Ok(Self { alpha, level: None })
    }

    /// Current level, if initialised
    pub fn level(&self) -> Option<f64> {
        self.level
    }
}

impl Smoother for SimpleSmoothing {
    fn update(&mut self, value: f64) -> Result<()> {
        check_observation(value)?;
        self.level = Some(match self.level {
            None => value,
            Some(level) => self.alpha * value + (1.0 - self.alpha) * level,
        });
        Ok(())
    }

    fn forecast(&self, steps: usize) -> Result<f64> {
        if steps == 0 {
            return Err(MathError::InvalidInput("Steps must be at least 1".to_string()));
        }
        self.level.ok_or_else(|| {
            MathError::InsufficientData("No data available for exponential smoothing".to_string())
        })
    }

    fn is_ready(&self) -> bool {
        self.level.is_some()
    }

    fn parameter_count(&self) -> usize {
        1
    }

    fn reset(&mut self) {
        self.level = None;
    }
}

/// Holt's linear trend method
#[derive(Debug, Clone)]
pub struct HoltLinear {
    alpha: f64,
    beta: f64,
    level: Option<f64>,
    trend: Option<f64>,
}

impl HoltLinear {
    /// Create a smoother with level factor `alpha` and trend factor `beta`
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        check_unit_interval("Alpha", alpha)?;
        check_unit_interval("Beta", beta)?;
        Ok(Self {
            alpha,
            beta,
            level: None,
            trend: None,
        })
    }

    /// Current trend, if at least two observations were seen
    pub fn trend(&self) -> Option<f64> {
        self.trend
    }
}

impl Smoother for HoltLinear {
    fn update(&mut self, value: f64) -> Result<()> {
        check_observation(value)?;
        match (self.level, self.trend) {
            (None, _) => {
                self.level = Some(value);
            }
            (Some(level), None) => {
                // second observation seeds the trend
                self.trend = Some(value - level);
                self.level = Some(value);
            }
            (Some(level), Some(trend)) => {
                let new_level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
                let new_trend = self.beta * (new_level - level) + (1.0 - self.beta) * trend;
                self.level = Some(new_level);
                self.trend = Some(new_trend);
            }
        }
        Ok(())
    }

    fn forecast(&self, steps: usize) -> Result<f64> {
        if steps == 0 {
            return Err(MathError::InvalidInput("Steps must be at least 1".to_string()));
        }
        match (self.level, self.trend) {
            (Some(level), Some(trend)) => Ok(level + steps as f64 * trend),
            _ => Err(MathError::InsufficientData(
                "Holt's method needs at least 2 observations".to_string(),
            )),
        }
    }

    fn is_ready(&self) -> bool {
        self.trend.is_some()
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn reset(&mut self) {
        self.level = None;
        self.trend = None;
    }
}

/// Additive seasonal smoothing without trend
///
/// The first full season initialises the level (its mean) and the seasonal
/// profile (deviations from that mean).
#[derive(Debug, Clone)]
pub struct SeasonalAdditive {
    alpha: f64,
    gamma: f64,
    season_length: usize,
    level: Option<f64>,
    seasonals: Vec<f64>,
    warmup: Vec<f64>,
    seen: usize,
}

impl SeasonalAdditive {
    /// Create a seasonal smoother; `season_length` must be at least 2
    pub fn new(alpha: f64, gamma: f64, season_length: usize) -> Result<Self> {
        check_unit_interval("Alpha", alpha)?;
        check_unit_interval("Gamma", gamma)?;
        if season_length < 2 {
            return Err(MathError::InvalidInput(format!(
                "Season length must be at least 2, got {}",
                season_length
            )));
        }
        Ok(Self {
            alpha,
            gamma,
            season_length,
            level: None,
            seasonals: Vec::with_capacity(season_length),
            warmup: Vec::with_capacity(season_length),
            seen: 0,
        })
    }

    /// Length of the seasonal cycle
    pub fn season_length(&self) -> usize {
        self.season_length
    }
}

impl Smoother for SeasonalAdditive {
    fn update(&mut self, value: f64) -> Result<()> {
        check_observation(value)?;
        match self.level {
            None => {
                self.warmup.push(value);
                if self.warmup.len() == self.season_length {
                    let mean = self.warmup.iter().sum::<f64>() / self.season_length as f64;
                    self.seasonals = self.warmup.iter().map(|v| v - mean).collect();
                    self.level = Some(mean);
                    self.warmup.clear();
                }
            }
            Some(level) => {
                let idx = self.seen % self.season_length;
                let season = self.seasonals[idx];
                let new_level = self.alpha * (value - season) + (1.0 - self.alpha) * level;
                self.seasonals[idx] =
                    self.gamma * (value - new_level) + (1.0 - self.gamma) * season;
                self.level = Some(new_level);
            }
        }
        self.seen += 1;
        Ok(())
    }

    fn forecast(&self, steps: usize) -> Result<f64> {
        if steps == 0 {
            return Err(MathError::InvalidInput("Steps must be at least 1".to_string()));
        }
        let level = self.level.ok_or_else(|| {
            MathError::InsufficientData(format!(
                "Seasonal smoothing needs a full season of {} observations",
                self.season_length
            ))
        })?;
        let idx = (self.seen + steps - 1) % self.season_length;
        Ok(level + self.seasonals[idx])
    }

    fn is_ready(&self) -> bool {
        self.level.is_some()
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn reset(&mut self) {
        self.level = None;
        self.seasonals.clear();
        self.warmup.clear();
        self.seen = 0;
    }
}

/// Serializable description of a smoother configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmoothingKind {
    Simple { alpha: f64 },
    Holt { alpha: f64, beta: f64 },
    Seasonal { alpha: f64, gamma: f64, season_length: usize },
}

impl SmoothingKind {
    /// Instantiate a fresh smoother with this configuration
    pub fn build(&self) -> Result<Box<dyn Smoother>> {
        Ok(match *self {
            SmoothingKind::Simple { alpha } => Box::new(SimpleSmoothing::new(alpha)?),
            SmoothingKind::Holt { alpha, beta } => Box::new(HoltLinear::new(alpha, beta)?),
            SmoothingKind::Seasonal {
                alpha,
                gamma,
                season_length,
            } => Box::new(SeasonalAdditive::new(alpha, gamma, season_length)?),
        })
    }
}

/// Run a smoother over `values`, collecting the one-step-ahead prediction
/// made before each observation (`None` while the smoother is warming up).
pub fn one_step_predictions(smoother: &mut dyn Smoother, values: &[f64]) -> Result<Vec<Option<f64>>> {
    let mut predictions = Vec::with_capacity(values.len());
    for &value in values {
        let prediction = if smoother.is_ready() {
            Some(smoother.forecast(1)?)
        } else {
            None
        };
        predictions.push(prediction);
        smoother.update(value)?;
    }
    Ok(predictions)
}
