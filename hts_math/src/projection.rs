//! Coherent projection of hierarchical forecasts
//!
//! Given a summing matrix `S` (all series x bottom series) and a diagonal
//! weighting `W`, the generalised least-squares projection
//!
//! ```text
//! P = (S' W^-1 S)^-1 S' W^-1
//! ```
//!
//! maps any stacked forecast vector onto bottom-level forecasts whose
//! aggregation `S P y` is coherent. `S' W^-1 S` is solved with a Cholesky
//! factorisation rather than inverted.

use crate::{MathError, Result};
use nalgebra::DMatrix;

/// Relative size below which a Cholesky pivot is treated as zero
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Precomputed projection for one summing matrix and weighting
#[derive(Debug, Clone)]
pub struct CoherentProjection {
    summing: DMatrix<f64>,
    projection: DMatrix<f64>,
}

/// Build the projection for summing matrix `summing` and the diagonal of `W`.
///
/// `weights[i]` is the error variance assigned to row `i`; identity weighting
/// (all ones) gives the OLS reconciliation.
pub fn coherent_projection(summing: &DMatrix<f64>, weights: &[f64]) -> Result<CoherentProjection> {
    let (n_series, n_bottom) = summing.shape();
    if n_series == 0 || n_bottom == 0 {
        return Err(MathError::InvalidInput(
            "Summing matrix must have at least one row and one column".to_string(),
        ));
    }
    if n_bottom > n_series {
        return Err(MathError::InvalidInput(format!(
            "Summing matrix has more columns ({}) than rows ({})",
            n_bottom, n_series
        )));
    }
    if weights.len() != n_series {
        return Err(MathError::InvalidInput(format!(
            "Weights length ({}) doesn't match summing matrix rows ({})",
            weights.len(),
            n_series
        )));
    }
    if let Some((row, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w <= 0.0)
    {
        return Err(MathError::InvalidInput(format!(
            "Weight for row {} must be positive and finite, got {}",
            row, w
        )));
    }

    // S' W^-1, scaling each column of S' by the inverse weight of its row
    let st_winv = DMatrix::from_fn(n_bottom, n_series, |j, i| summing[(i, j)] / weights[i]);
    let normal = &st_winv * summing;

    let max_diag = normal.diagonal().iter().cloned().fold(0.0_f64, f64::max);
    let cholesky = normal.cholesky().ok_or_else(|| {
        MathError::SingularMatrix(format!(
            "S'W^-1S ({}x{}) is not positive definite",
            n_bottom, n_bottom
        ))
    })?;

    let factor = cholesky.l();
    if let Some(col) = (0..n_bottom).find(|&k| factor[(k, k)].powi(2) <= PIVOT_TOLERANCE * max_diag) {
        return Err(MathError::SingularMatrix(format!(
            "S'W^-1S is numerically rank deficient at bottom column {}",
            col
        )));
    }

    let projection = cholesky.solve(&st_winv);

    Ok(CoherentProjection {
        summing: summing.clone(),
        projection,
    })
}

/// Structural weights: each row's number of descendant bottom series
pub fn structural_weights(summing: &DMatrix<f64>) -> Vec<f64> {
    summing.row_iter().map(|row| row.sum()).collect()
}

impl CoherentProjection {
    /// The projection matrix `P` (bottom series x all series)
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.projection
    }

    /// Bottom-level forecasts `P Y` for a stacked forecast matrix (series x horizon)
    pub fn bottom(&self, base: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if base.nrows() != self.projection.ncols() {
            return Err(MathError::InvalidInput(format!(
                "Forecast rows ({}) don't match summing matrix rows ({})",
                base.nrows(),
                self.projection.ncols()
            )));
        }
        Ok(&self.projection * base)
    }

    /// Aggregate bottom-level values up the hierarchy (`S B`)
    pub fn aggregate(&self, bottom: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if bottom.nrows() != self.summing.ncols() {
            return Err(MathError::InvalidInput(format!(
                "Bottom rows ({}) don't match summing matrix columns ({})",
                bottom.nrows(),
                self.summing.ncols()
            )));
        }
        Ok(&self.summing * bottom)
    }

    /// Project and re-aggregate. With `nonnegative`, negative bottom values
    /// are clipped to zero before aggregation so every level stays coherent.
    pub fn reconcile(&self, base: &DMatrix<f64>, nonnegative: bool) -> Result<DMatrix<f64>> {
        let mut bottom = self.bottom(base)?;
        if nonnegative {
            bottom.apply(|v| {
                if *v < 0.0 {
                    *v = 0.0;
                }
            });
        }
        self.aggregate(&bottom)
    }
}
