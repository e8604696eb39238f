//! Projection of reconciled forecasts back onto hierarchy columns

use crate::error::{HtsError, Result};
use crate::hierarchy::Tags;
use crate::keys::split_unique_id;
use crate::reconcile::ReconciledTable;
use crate::utils::DS_FORMAT;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name pattern of a prediction run
pub const PREDICTIONS_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// Key values in the order of the output columns
    pub keys: Vec<String>,
    pub ds: NaiveDate,
    pub forecast: f64,
    pub reconciled: f64,
}

/// Reconciled forecasts of one level with the key split into its columns
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutput {
    pub columns: Vec<String>,
    pub forecast_column: String,
    pub reconciled_column: String,
    pub rows: Vec<OutputRow>,
}

impl ForecastOutput {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert to a DataFrame: key columns, `ds`, base and reconciled forecasts
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut series = Vec::with_capacity(self.columns.len() + 3);
        for (c, name) in self.columns.iter().enumerate() {
            let values: Vec<&str> = self.rows.iter().map(|r| r.keys[c].as_str()).collect();
            series.push(Series::new(name, values));
        }

        let ds: Vec<String> = self
            .rows
            .iter()
            .map(|r| r.ds.format(DS_FORMAT).to_string())
            .collect();
        series.push(Series::new("ds", ds));

        let forecasts: Vec<f64> = self.rows.iter().map(|r| r.forecast).collect();
        series.push(Series::new(&self.forecast_column, forecasts));

        let reconciled: Vec<f64> = self.rows.iter().map(|r| r.reconciled).collect();
        series.push(Series::new(&self.reconciled_column, reconciled));

        Ok(DataFrame::new(series)?)
    }

    /// Write `predictions_<timestamp>.csv` into `dir`, returning its path
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P, timestamp: NaiveDateTime) -> Result<PathBuf> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(format!(
            "predictions_{}.csv",
            timestamp.format(PREDICTIONS_TIMESTAMP)
        ));

        let mut df = self.to_dataframe()?;
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;

        info!(path = %path.display(), rows = self.rows.len(), "wrote predictions");
        Ok(path)
    }
}

/// Splits rendered series ids of one level back into grouping columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputProjector {
    columns: Vec<String>,
}

impl OutputProjector {
    /// `columns` are the hierarchy grouping columns, root first
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        if columns.is_empty() {
            return Err(HtsError::InvalidParameter(
                "Output needs at least one key column".to_string(),
            ));
        }
        Ok(Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Project the rows of `level` (the bottom level when `None`)
    pub fn project(
        &self,
        table: &ReconciledTable,
        tags: &Tags,
        level: Option<&str>,
    ) -> Result<ForecastOutput> {
        let tag = match level {
            Some(name) => tags.iter().find(|t| t.level == name),
            None => tags.bottom(),
        }
        .ok_or_else(|| {
            HtsError::InvalidParameter(format!(
                "Unknown hierarchy level '{}'",
                level.unwrap_or("<bottom>")
            ))
        })?;

        // a level named `a/b` is keyed by the first two grouping columns
        let depth = tag.level.split('/').count();
        let columns = self.columns.get(..depth).ok_or_else(|| {
            HtsError::InvalidParameter(format!(
                "Level '{}' is deeper than the {} output columns",
                tag.level,
                self.columns.len()
            ))
        })?;
        if columns.join("/") != tag.level {
            return Err(HtsError::InvalidParameter(format!(
                "Level '{}' does not match the output columns {:?}",
                tag.level, columns
            )));
        }

        let members: HashSet<_> = tag.keys.iter().collect();
        let mut rows = Vec::with_capacity(members.len() * table.horizon);
        for row in table.rows.iter().filter(|r| members.contains(&r.key)) {
            let keys = split_unique_id(&row.key.render(), depth)?;
            rows.push(OutputRow {
                keys,
                ds: row.ds,
                forecast: row.forecast,
                reconciled: row.reconciled,
            });
        }

        info!(level = %tag.level, rows = rows.len(), "projected forecasts");

        Ok(ForecastOutput {
            columns: columns.to_vec(),
            forecast_column: table.model.clone(),
            reconciled_column: table.reconciled_label.clone(),
            rows,
        })
    }
}
