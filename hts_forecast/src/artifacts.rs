//! Training artifacts persisted between the train and infer stages
//!
//! A model directory holds four JSON files:
//!
//! - `model.json`: the forecaster bundle
//! - `hierarchy.json`: grouping columns plus the aggregated training series
//! - `summing.json`: the summing matrix
//! - `tags.json`: level name to series ids

use crate::error::{HtsError, Result};
use crate::hierarchy::{AggregatedSeries, Hierarchy, HierarchySpec, SummingMatrix, Tags};
use crate::models::ForecasterSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const MODEL_FILE: &str = "model.json";
pub const HIERARCHY_FILE: &str = "hierarchy.json";
pub const SUMMING_FILE: &str = "summing.json";
pub const TAGS_FILE: &str = "tags.json";

#[derive(Debug, Serialize, Deserialize)]
struct HierarchyRecord {
    spec: HierarchySpec,
    series: AggregatedSeries,
}

/// Fitted model bundle together with the hierarchy it was trained on
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingArtifacts {
    pub model: ForecasterSpec,
    pub hierarchy: Hierarchy,
}

impl TrainingArtifacts {
    pub fn new(model: ForecasterSpec, hierarchy: Hierarchy) -> Self {
        Self { model, hierarchy }
    }

    /// Write all artifact files into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(
            &dir.join(HIERARCHY_FILE),
            &HierarchyRecord {
                spec: self.hierarchy.spec.clone(),
                series: self.hierarchy.series.clone(),
            },
        )?;
        write_json(&dir.join(SUMMING_FILE), &self.hierarchy.summing)?;
        write_json(&dir.join(TAGS_FILE), &self.hierarchy.tags)?;

        info!(
            dir = %dir.display(),
            series = self.hierarchy.n_series(),
            "saved training artifacts"
        );
        Ok(())
    }

    /// Read artifacts written by [`TrainingArtifacts::save`]
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let model: ForecasterSpec = read_json(&dir.join(MODEL_FILE))?;
        let record: HierarchyRecord = read_json(&dir.join(HIERARCHY_FILE))?;
        let summing: SummingMatrix = read_json(&dir.join(SUMMING_FILE))?;
        let tags: Tags = read_json(&dir.join(TAGS_FILE))?;

        let (n_series, _) = summing.shape();
        if record.series.len() != n_series {
            return Err(HtsError::DataError(format!(
                "Artifacts disagree: {} series but summing matrix has {} rows",
                record.series.len(),
                n_series
            )));
        }
        let tagged: usize = tags.iter().map(|t| t.keys.len()).sum();
        if tagged != n_series {
            return Err(HtsError::DataError(format!(
                "Artifacts disagree: {} tagged series but summing matrix has {} rows",
                tagged, n_series
            )));
        }

        info!(dir = %dir.display(), series = n_series, "loaded training artifacts");

        Ok(Self {
            model,
            hierarchy: Hierarchy {
                spec: record.spec,
                series: record.series,
                summing,
                tags,
            },
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| {
        HtsError::DataError(format!("Cannot open artifact '{}': {}", path.display(), err))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
