//! # HTS Forecast
//!
//! Hierarchical daily sales forecasting with coherent reconciliation.
//!
//! Sparse per-shop, per-item daily sales are completed into dense series,
//! aggregated into a `total → shop → item` hierarchy, forecast
//! independently per series and reconciled with MinTrace so that every
//! aggregate equals the sum of its children.
//!
//! ## Pipeline
//!
//! - **prep**: [`data::SalesLoader`] → [`completion::CompletenessFilter`] →
//!   [`completion::SeriesCompleter`], written as a dense training table
//! - **train**: [`hierarchy::HierarchyBuilder`] produces the aggregated series,
//!   summing matrix and tags, persisted as [`artifacts::TrainingArtifacts`]
//! - **infer**: [`forecast::forecast_hierarchy`] → [`reconcile::Reconciler`] →
//!   [`output::OutputProjector`], written as `predictions_<timestamp>.csv`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hts_forecast::config::PipelineConfig;
//! use hts_forecast::pipeline;
//!
//! let config = PipelineConfig::from_json_file("pipeline.json")?;
//! let predictions = pipeline::run(&config)?;
//! println!("wrote {}", predictions.display());
//! # Ok::<(), hts_forecast::HtsError>(())
//! ```

pub mod artifacts;
pub mod completion;
pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod hierarchy;
pub mod keys;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod utils;

// Re-export commonly used types
pub use crate::artifacts::TrainingArtifacts;
pub use crate::completion::{CompletenessFilter, PairScope, SeriesCompleter};
pub use crate::config::PipelineConfig;
pub use crate::data::{BottomFrame, Observation, SalesLoader};
pub use crate::error::{HtsError, Result};
pub use crate::forecast::{forecast_hierarchy, ForecastMatrix, RetryPolicy};
pub use crate::hierarchy::{Hierarchy, HierarchyBuilder, HierarchySpec, SummingMatrix, Tags};
pub use crate::keys::{KeyValue, SeriesKey};
pub use crate::models::{Forecaster, ForecasterSpec, History, SeriesForecast};
pub use crate::output::{ForecastOutput, OutputProjector};
pub use crate::reconcile::{ReconciledTable, ReconciliationMethod, Reconciler};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
