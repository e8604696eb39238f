//! # HTS Sales Workspace
//!
//! Umbrella crate over the workspace members:
//!
//! - [`hts_math`]: smoothing recursions and the coherent projection kernel
//! - [`hts_forecast`]: the completion → hierarchy → forecast → reconcile →
//!   output pipeline
//!
//! ## Example
//!
//! ```
//! use hts_sales_workspace::prelude::*;
//!
//! let spec = HierarchySpec::new(&["total", "shop_id", "item_id"]).unwrap();
//! assert_eq!(spec.bottom_level_name(), "total/shop_id/item_id");
//! assert_eq!(Reconciler::default().label("AutoETS"), "AutoETS/MinTrace_method-ols_nonnegative-True");
//! ```

pub use hts_forecast;
pub use hts_math;

/// The types most pipelines need
pub mod prelude {
    pub use hts_forecast::{
        CompletenessFilter, ForecastOutput, Forecaster, ForecasterSpec, Hierarchy,
        HierarchyBuilder, HierarchySpec, HtsError, OutputProjector, PairScope, PipelineConfig,
        ReconciliationMethod, Reconciler, SeriesCompleter, SeriesKey, TrainingArtifacts,
    };
    pub use hts_forecast::pipeline::{infer, prepare, run, train};
}
