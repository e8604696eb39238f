//! The three pipeline stages and their composition
//!
//! `prep` turns raw daily sales into a dense training table, `train` builds
//! the hierarchy and persists it next to the model bundle, and `infer`
//! forecasts every series, reconciles and writes bottom-level predictions.
//! Each public stage wraps its failures with the stage name.

use crate::artifacts::TrainingArtifacts;
use crate::completion::{CompletenessFilter, SeriesCompleter};
use crate::config::{PipelineConfig, TOTAL_COLUMN, TOTAL_LABEL};
use crate::data::{BottomFrame, Observation, SalesLoader};
use crate::error::{HtsError, Result};
use crate::forecast::forecast_hierarchy;
use crate::hierarchy::{HierarchyBuilder, HierarchySpec};
use crate::output::{ForecastOutput, OutputProjector};
use crate::reconcile::ReconciledTable;
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, warn};

/// Load raw sales, filter and complete them, and write the training table
pub fn prepare(config: &PipelineConfig) -> Result<BottomFrame> {
    let run = || -> Result<BottomFrame> {
        config.validate()?;
        let observations = SalesLoader::from_csv(&config.source_path, &config.columns)?;
        let frame = prepare_frame(observations, config)?;
        if let Some(parent) = config.prep_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        frame.write_csv(&config.prep_path)?;
        Ok(frame)
    };
    run().map_err(|e| e.in_stage("prep"))
}

/// In-memory part of `prep`: completeness filter, zero-completion and the
/// constant root column
pub fn prepare_frame(observations: Vec<Observation>, config: &PipelineConfig) -> Result<BottomFrame> {
    let filter = match config.min_positive_periods {
        Some(n) => CompletenessFilter::at_least(n),
        None => CompletenessFilter::all_periods(),
    };
    let (kept, summary) = filter.apply(observations);
    if kept.is_empty() {
        return Err(HtsError::DataError(format!(
            "No shop/item pair has sales in {} periods",
            summary.required_periods
        )));
    }
    if summary.dropped_pairs > 0 {
        warn!(
            dropped = summary.dropped_pairs,
            kept = summary.kept_pairs,
            "excluded incomplete shop/item pairs"
        );
    }

    SeriesCompleter::new(config.pair_scope)
        .with_columns(&config.columns.shop, &config.columns.item)
        .complete(&kept)?
        .with_constant_column(TOTAL_COLUMN, TOTAL_LABEL)
}

/// Build the hierarchy from the training table and save the artifacts
pub fn train(config: &PipelineConfig) -> Result<TrainingArtifacts> {
    let run = || -> Result<TrainingArtifacts> {
        config.validate()?;
        let columns = vec![
            TOTAL_COLUMN.to_string(),
            config.columns.shop.clone(),
            config.columns.item.clone(),
        ];
        let frame = BottomFrame::read_csv(&config.prep_path, &columns)?;
        let artifacts = train_from_frame(&frame, config)?;
        artifacts.save(&config.model_dir)?;
        Ok(artifacts)
    };
    run().map_err(|e| e.in_stage("train"))
}

/// In-memory part of `train`
pub fn train_from_frame(frame: &BottomFrame, config: &PipelineConfig) -> Result<TrainingArtifacts> {
    let spec = HierarchySpec::new(&config.hierarchy)?;
    let hierarchy = HierarchyBuilder::build(frame, &spec)?;
    // fail here rather than at inference on an unusable model bundle
    let forecaster = config.model.build()?;

    info!(
        model = forecaster.name(),
        series = hierarchy.n_series(),
        days = hierarchy.series.calendar.len(),
        "trained hierarchy"
    );
    Ok(TrainingArtifacts::new(config.model.clone(), hierarchy))
}

/// Forecast and reconcile from saved artifacts, then write the bottom level
pub fn infer(config: &PipelineConfig) -> Result<PathBuf> {
    let run = || -> Result<PathBuf> {
        config.validate()?;
        let artifacts = TrainingArtifacts::load(&config.model_dir)?;
        let output = infer_from_artifacts(&artifacts, config)?;
        output.write_csv(&config.output_dir, Local::now().naive_local())
    };
    run().map_err(|e| e.in_stage("infer"))
}

/// Base forecasts for every series, reconciled against the saved hierarchy
pub fn forecast_and_reconcile(
    artifacts: &TrainingArtifacts,
    config: &PipelineConfig,
) -> Result<ReconciledTable> {
    let forecaster = artifacts.model.build()?;
    let hierarchy = &artifacts.hierarchy;
    let forecasts = forecast_hierarchy(
        forecaster.as_ref(),
        &hierarchy.series,
        config.horizon,
        config.season_length,
        &config.retry_policy(),
    )?;
    config
        .reconciler()
        .reconcile(&forecasts, &hierarchy.series, &hierarchy.summing, &hierarchy.tags)
}

/// In-memory part of `infer`: reconciled bottom-level forecasts split back
/// into the grouping columns
pub fn infer_from_artifacts(
    artifacts: &TrainingArtifacts,
    config: &PipelineConfig,
) -> Result<ForecastOutput> {
    let table = forecast_and_reconcile(artifacts, config)?;
    let hierarchy = &artifacts.hierarchy;
    OutputProjector::new(hierarchy.spec.columns())?.project(&table, &hierarchy.tags, None)
}

/// Run `prep`, `train` and `infer` back to back; returns the predictions file
pub fn run(config: &PipelineConfig) -> Result<PathBuf> {
    prepare(config)?;
    train(config)?;
    let path = infer(config)?;
    info!(path = %path.display(), "pipeline finished");
    Ok(path)
}
