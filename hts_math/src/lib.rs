//! # HTS Math
//!
//! Numeric building blocks for hierarchical time series forecasting.
//! This crate provides the exponential smoothing recursions used by the
//! per-series forecasters and the least-squares projection that maps
//! independent forecasts onto the coherent subspace of a summing matrix.

use thiserror::Error;

pub mod projection;
pub mod smoothing;

pub use projection::{coherent_projection, structural_weights, CoherentProjection};
pub use smoothing::{
    one_step_predictions, HoltLinear, SeasonalAdditive, SimpleSmoothing, Smoother, SmoothingKind,
};

// Re-exported so callers can build summing matrices without a direct dependency
pub use nalgebra::DMatrix;

/// Errors that can occur in numeric routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Matrix is singular or not positive definite: {0}")]
    SingularMatrix(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = MathError::SingularMatrix("S'WS is 3x3".to_string());
        assert!(err.to_string().contains("S'WS is 3x3"));
    }
}
