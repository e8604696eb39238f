//! MinTrace reconciliation of hierarchical forecasts
//!
//! Independent base forecasts `Y` are projected onto the coherent subspace
//! spanned by the summing matrix:
//!
//! ```text
//! Y_rec = S (S' W^-1 S)^-1 S' W^-1 Y
//! ```
//!
//! one horizon column at a time. With non-negativity on, negative bottom
//! forecasts are clipped to zero and every aggregate is re-derived as the
//! sum of its bottom series, which keeps the result coherent by
//! construction.

use crate::error::{HtsError, Result};
use crate::forecast::ForecastMatrix;
use crate::hierarchy::{AggregatedSeries, SummingMatrix, Tags};
use crate::keys::SeriesKey;
use chrono::NaiveDate;
use hts_math::{coherent_projection, structural_weights, DMatrix, MathError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

/// Variance floor for series whose in-sample residuals are all zero
const MIN_RESIDUAL_VARIANCE: f64 = 1e-8;

/// Error covariance weighting of the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationMethod {
    /// Identity weighting: every series equally reliable
    #[default]
    Ols,
    /// Weight by the number of bottom series under each row
    WlsStruct,
    /// Weight by each series' in-sample residual variance
    WlsVar,
}

impl fmt::Display for ReconciliationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReconciliationMethod::Ols => "ols",
            ReconciliationMethod::WlsStruct => "wls_struct",
            ReconciliationMethod::WlsVar => "wls_var",
        };
        f.write_str(label)
    }
}

/// One reconciled value
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub key: SeriesKey,
    pub level: String,
    pub ds: NaiveDate,
    /// Horizon step, starting at 1
    pub step: usize,
    /// Base forecast before reconciliation
    pub forecast: f64,
    pub reconciled: f64,
}

/// Base and reconciled forecasts for every series and horizon step
///
/// Rows are grouped by series in hierarchy order, each group ordered by
/// horizon step.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledTable {
    pub model: String,
    /// Name of the reconciled column, e.g. `AutoETS/MinTrace_method-ols_nonnegative-True`
    pub reconciled_label: String,
    pub horizon: usize,
    pub rows: Vec<ReconciledRow>,
}

impl ReconciledTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reconciled values of one series by key, in horizon order
    pub fn reconciled(&self, key: &SeriesKey) -> Option<Vec<f64>> {
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter(|r| &r.key == key)
            .map(|r| r.reconciled)
            .collect();
        (!values.is_empty()).then_some(values)
    }

    /// Largest absolute gap between any row and the sum of its bottom series
    pub fn max_incoherence(&self, summing: &SummingMatrix) -> f64 {
        let h = self.horizon;
        let offset = summing.bottom_offset();
        let value = |row: usize, t: usize| self.rows[row * h + t].reconciled;

        let mut worst = 0.0_f64;
        for i in 0..summing.shape().0 {
            for t in 0..h {
                let total: f64 = summing.row(i).iter().map(|&j| value(offset + j, t)).sum();
                worst = worst.max((value(i, t) - total).abs());
            }
        }
        worst
    }
}

/// Reconciles base forecasts against the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    method: ReconciliationMethod,
    nonnegative: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconciliationMethod::Ols, true)
    }
}

impl Reconciler {
    pub fn new(method: ReconciliationMethod, nonnegative: bool) -> Self {
        Self {
            method,
            nonnegative,
        }
    }

    pub fn method(&self) -> ReconciliationMethod {
        self.method
    }

    /// Column label in the naming scheme of the reconciled output
    pub fn label(&self, model: &str) -> String {
        format!(
            "{}/MinTrace_method-{}_nonnegative-{}",
            model,
            self.method,
            if self.nonnegative { "True" } else { "False" }
        )
    }

    /// Reconcile `forecasts`; `history` holds the training values of the
    /// same rows and feeds the residual variances of `WlsVar`.
    pub fn reconcile(
        &self,
        forecasts: &ForecastMatrix,
        history: &AggregatedSeries,
        summing: &SummingMatrix,
        tags: &Tags,
    ) -> Result<ReconciledTable> {
        let (n_series, _) = summing.shape();
        let horizon = forecasts.horizon();
        if horizon == 0 {
            return Err(HtsError::InvalidParameter(
                "Cannot reconcile an empty horizon".to_string(),
            ));
        }
        if forecasts.len() != n_series || history.len() != n_series {
            return Err(HtsError::DataError(format!(
                "Forecasts ({}) and history ({}) must have one row per summing matrix row ({})",
                forecasts.len(),
                history.len(),
                n_series
            )));
        }
        if forecasts.keys != history.keys {
            return Err(HtsError::DataError(
                "Forecast rows are not in the order of the hierarchy".to_string(),
            ));
        }
        if let Some((i, row)) = forecasts
            .values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != horizon)
        {
            return Err(HtsError::DataError(format!(
                "Series '{}' has {} forecasts, expected {}",
                forecasts.keys[i],
                row.len(),
                horizon
            )));
        }

        let dense = summing.to_dense();
        let weights = self.weights(forecasts, history, &dense)?;
        let projection = coherent_projection(&dense, &weights).map_err(|err| match err {
            MathError::SingularMatrix(message) => HtsError::SingularMatrix {
                level: diagnose_singular_level(summing, tags, &forecasts.keys),
                message,
            },
            other => HtsError::from(other),
        })?;

        let base = DMatrix::from_fn(n_series, horizon, |i, t| forecasts.values[i][t]);
        let reconciled = projection.reconcile(&base, self.nonnegative)?;

        debug!(
            method = %self.method,
            nonnegative = self.nonnegative,
            "projected forecasts onto coherent subspace"
        );

        let mut rows = Vec::with_capacity(n_series * horizon);
        for (i, key) in forecasts.keys.iter().enumerate() {
            let level = tags.level_of(key).unwrap_or_default().to_string();
            for (t, ds) in forecasts.dates.iter().enumerate() {
                rows.push(ReconciledRow {
                    key: key.clone(),
                    level: level.clone(),
                    ds: *ds,
                    step: t + 1,
                    forecast: base[(i, t)],
                    reconciled: reconciled[(i, t)],
                });
            }
        }

        info!(
            series = n_series,
            horizon,
            method = %self.method,
            "reconciled forecasts"
        );

        Ok(ReconciledTable {
            model: forecasts.model.clone(),
            reconciled_label: self.label(&forecasts.model),
            horizon,
            rows,
        })
    }

    fn weights(
        &self,
        forecasts: &ForecastMatrix,
        history: &AggregatedSeries,
        dense: &DMatrix<f64>,
    ) -> Result<Vec<f64>> {
        match self.method {
            ReconciliationMethod::Ols => Ok(vec![1.0; dense.nrows()]),
            ReconciliationMethod::WlsStruct => Ok(structural_weights(dense)),
            ReconciliationMethod::WlsVar => forecasts
                .fitted
                .iter()
                .zip(&history.values)
                .zip(&forecasts.keys)
                .map(|((fitted, actual), key)| {
                    let fitted = fitted.as_ref().ok_or_else(|| {
                        HtsError::InvalidParameter(format!(
                            "wls_var needs in-sample fitted values; series '{}' has none",
                            key
                        ))
                    })?;
                    residual_variance(key, actual, fitted)
                })
                .collect(),
        }
    }
}

fn residual_variance(key: &SeriesKey, actual: &[f64], fitted: &[f64]) -> Result<f64> {
    if actual.len() != fitted.len() || actual.is_empty() {
        return Err(HtsError::DataError(format!(
            "Series '{}' has {} fitted values for {} observations",
            key,
            fitted.len(),
            actual.len()
        )));
    }
    let mse = actual
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    Ok(mse.max(MIN_RESIDUAL_VARIANCE))
}

/// Best guess at the level responsible for a rank-deficient `S`
fn diagnose_singular_level(summing: &SummingMatrix, tags: &Tags, keys: &[SeriesKey]) -> String {
    for tag in tags.iter() {
        let mut seen = HashSet::new();
        if tag.keys.iter().any(|k| !seen.insert(k)) {
            return tag.level.clone();
        }
    }

    let mut seen = HashSet::new();
    if let Some(dup) = keys.iter().find(|k| !seen.insert(*k)) {
        if let Some(level) = tags.level_of(dup) {
            return level.to_string();
        }
    }

    // without duplicate ids the bottom block itself must be broken
    debug!(
        bottom_identity = summing.has_bottom_identity(),
        "no duplicate ids behind singular summing matrix"
    );
    tags.bottom()
        .map(|t| t.level.clone())
        .unwrap_or_else(|| "bottom".to_string())
}
