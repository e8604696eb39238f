//! Hierarchy construction: nested levels, aggregated series, summing matrix
//! and per-level tags
//!
//! A hierarchy is declared as an ordered list of grouping columns, outermost
//! first (e.g. `["total", "shop_id", "item_id"]`). Every prefix of that list
//! is one level; the full list is the bottom level. Rows of the aggregated
//! set are ordered level by level from the root, keys sorted within a level,
//! and the bottom level always comes last.

use crate::data::BottomFrame;
use crate::error::{HtsError, Result};
use crate::keys::SeriesKey;
use chrono::NaiveDate;
use hts_math::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Ordered grouping columns of a strict tree hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySpec {
    columns: Vec<String>,
}

/// One level of the hierarchy: a prefix of the grouping columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLevel {
    /// Column names joined with `/`, e.g. `total/shop_id`
    pub name: String,
    pub columns: Vec<String>,
}

impl HierarchySpec {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        if columns.is_empty() {
            return Err(HtsError::InvalidParameter(
                "Hierarchy needs at least one grouping column".to_string(),
            ));
        }
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(HtsError::InvalidParameter(format!(
                "Grouping column '{}' appears twice in the hierarchy",
                dup
            )));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn depth(&self) -> usize {
        self.columns.len()
    }

    /// Expand the flat column list into its nested prefix levels, root first
    pub fn levels(&self) -> Vec<HierarchyLevel> {
        (1..=self.columns.len())
            .map(|depth| {
                let columns = self.columns[..depth].to_vec();
                HierarchyLevel {
                    name: columns.join("/"),
                    columns,
                }
            })
            .collect()
    }

    /// Name of the bottom level
    pub fn bottom_level_name(&self) -> String {
        self.columns.join("/")
    }
}

/// All series of the hierarchy over the training calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub calendar: Vec<NaiveDate>,
    pub keys: Vec<SeriesKey>,
    pub values: Vec<Vec<f64>>,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Values of one series by key
    pub fn get(&self, key: &SeriesKey) -> Option<&[f64]> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.values[i].as_slice())
    }
}

/// Binary summing matrix stored by row as the bottom columns each row sums
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummingMatrix {
    n_bottom: usize,
    rows: Vec<Vec<usize>>,
}

impl SummingMatrix {
    /// Build from per-row column lists; columns must be below `n_bottom`
    pub fn new(n_bottom: usize, rows: Vec<Vec<usize>>) -> Result<Self> {
        if n_bottom > rows.len() {
            return Err(HtsError::DataError(format!(
                "Summing matrix has {} bottom columns but only {} rows",
                n_bottom,
                rows.len()
            )));
        }
        if let Some(col) = rows.iter().flatten().find(|&&c| c >= n_bottom) {
            return Err(HtsError::DataError(format!(
                "Summing matrix column {} out of range ({} bottom series)",
                col, n_bottom
            )));
        }
        Ok(Self { n_bottom, rows })
    }

    /// (rows, bottom columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.n_bottom)
    }

    /// Index of the first bottom row
    pub fn bottom_offset(&self) -> usize {
        self.rows.len() - self.n_bottom
    }

    /// Bottom columns summed by row `i`
    pub fn row(&self, i: usize) -> &[usize] {
        &self.rows[i]
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        self.rows[i].binary_search(&j).is_ok()
    }

    /// Whether the bottom rows form an identity block
    pub fn has_bottom_identity(&self) -> bool {
        let offset = self.bottom_offset();
        (0..self.n_bottom).all(|j| self.rows[offset + j] == [j])
    }

    /// Dense 0/1 matrix for the projection algebra
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows.len(), self.n_bottom);
        for (i, cols) in self.rows.iter().enumerate() {
            for &j in cols {
                dense[(i, j)] = 1.0;
            }
        }
        dense
    }

    /// Sum bottom-level values into every row of the hierarchy
    pub fn aggregate(&self, bottom: &[f64]) -> Result<Vec<f64>> {
        if bottom.len() != self.n_bottom {
            return Err(HtsError::DataError(format!(
                "Expected {} bottom values, got {}",
                self.n_bottom,
                bottom.len()
            )));
        }
        Ok(self
            .rows
            .iter()
            .map(|cols| cols.iter().map(|&j| bottom[j]).sum())
            .collect())
    }
}

/// Series ids belonging to one hierarchy level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub level: String,
    pub keys: Vec<SeriesKey>,
}

/// Level name to series ids, in hierarchy order (root first)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tags {
    entries: Vec<Tag>,
}

impl Tags {
    pub fn new(entries: Vec<Tag>) -> Self {
        Self { entries }
    }

    pub fn get(&self, level: &str) -> Option<&[SeriesKey]> {
        self.entries
            .iter()
            .find(|t| t.level == level)
            .map(|t| t.keys.as_slice())
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|t| t.level.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.entries.iter()
    }

    /// The bottom (last) level
    pub fn bottom(&self) -> Option<&Tag> {
        self.entries.last()
    }

    /// Level a key belongs to, by its depth
    pub fn level_of(&self, key: &SeriesKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|t| t.keys.first().map(SeriesKey::len) == Some(key.len()))
            .map(|t| t.level.as_str())
    }
}

/// Everything the hierarchy stage produces
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub spec: HierarchySpec,
    pub series: AggregatedSeries,
    pub summing: SummingMatrix,
    pub tags: Tags,
}

impl Hierarchy {
    pub fn n_series(&self) -> usize {
        self.series.len()
    }

    pub fn n_bottom(&self) -> usize {
        self.summing.shape().1
    }
}

/// Derives the aggregated series set, `S` and tags from bottom series
#[derive(Debug, Clone, Default)]
pub struct HierarchyBuilder;

impl HierarchyBuilder {
    pub fn build(frame: &BottomFrame, spec: &HierarchySpec) -> Result<Hierarchy> {
        if frame.is_empty() {
            return Err(HtsError::DataError(
                "Cannot build a hierarchy without bottom series".to_string(),
            ));
        }

        // frame key positions of each hierarchy column
        let positions = spec
            .columns()
            .iter()
            .map(|c| {
                frame.column_index(c).ok_or_else(|| {
                    HtsError::DataError(format!("Hierarchy column '{}' not found in series", c))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n_days = frame.calendar().len();
        // frame keys finer than the hierarchy collapse into their bottom key
        let collapses = positions.len() < frame.columns().len();
        let mut bottom: BTreeMap<SeriesKey, Vec<f64>> = BTreeMap::new();
        for s in frame.series() {
            let parts = s.key.parts();
            let key = SeriesKey::new(positions.iter().map(|&p| parts[p].clone()).collect());
            match bottom.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(s.values.clone());
                }
                Entry::Occupied(mut slot) if collapses => {
                    for (a, v) in slot.get_mut().iter_mut().zip(&s.values) {
                        *a += v;
                    }
                }
                Entry::Occupied(slot) => {
                    return Err(HtsError::DataError(format!(
                        "Duplicate bottom-level series '{}'",
                        slot.key()
                    )));
                }
            }
        }
        if collapses {
            debug!(
                frame_series = frame.len(),
                bottom = bottom.len(),
                "summed frame series into hierarchy bottom level"
            );
        }

        let levels = spec.levels();
        let depth = spec.depth();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let mut tags = Vec::with_capacity(levels.len());

        for (level_idx, level) in levels.iter().enumerate() {
            let level_depth = level_idx + 1;
            let mut sums: BTreeMap<SeriesKey, Vec<f64>> = BTreeMap::new();
            if level_depth == depth {
                for (key, series) in &bottom {
                    sums.insert(key.clone(), series.clone());
                }
            } else {
                for (key, series) in &bottom {
                    let acc = sums
                        .entry(key.prefix(level_depth))
                        .or_insert_with(|| vec![0.0; n_days]);
                    for (a, v) in acc.iter_mut().zip(series.iter()) {
                        *a += v;
                    }
                }
            }

            // e.g. a missing component and a literal `NA` render to the same id
            let mut rendered = HashSet::new();
            if let Some(clash) = sums.keys().find(|k| !rendered.insert(k.render())) {
                return Err(HtsError::DataError(format!(
                    "Series id '{}' is ambiguous at level '{}': distinct keys render to the same id",
                    clash, level.name
                )));
            }

            tags.push(Tag {
                level: level.name.clone(),
                keys: sums.keys().cloned().collect(),
            });
            for (key, series) in sums {
                keys.push(key);
                values.push(series);
            }
        }

        let row_of: HashMap<&SeriesKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let mut rows = vec![Vec::new(); keys.len()];
        for (j, key) in bottom.keys().enumerate() {
            for level_depth in 1..=depth {
                let row = row_of[&key.prefix(level_depth)];
                rows[row].push(j);
            }
        }
        let summing = SummingMatrix::new(bottom.len(), rows)?;

        info!(
            levels = levels.len(),
            series = keys.len(),
            bottom = bottom.len(),
            "built hierarchy"
        );

        Ok(Hierarchy {
            spec: spec.clone(),
            series: AggregatedSeries {
                calendar: frame.calendar().to_vec(),
                keys,
                values,
            },
            summing,
            tags: Tags::new(tags),
        })
    }
}
