//! Completeness filtering and zero-completion of sparse daily sales

use crate::data::{BottomFrame, BottomSeries, Observation};
use crate::error::{HtsError, Result};
use crate::keys::{KeyValue, SeriesKey};
use crate::utils::{daily_calendar, month_index};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

type Pair = (KeyValue, KeyValue);

/// Which shop/item pairs the completed calendar is expanded over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairScope {
    /// Every distinct shop crossed with every distinct item
    #[default]
    Global,
    /// Only pairs that appear in the data
    Observed,
}

/// Outcome of the completeness filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSummary {
    /// Threshold of distinct positive-sales periods that was applied
    pub required_periods: usize,
    pub kept_pairs: usize,
    pub dropped_pairs: usize,
}

/// Keeps only shop/item pairs with enough periods of real sales
#[derive(Debug, Clone, Default)]
pub struct CompletenessFilter {
    min_positive_periods: Option<usize>,
}

impl CompletenessFilter {
    /// Require sales in every period observed in the dataset
    pub fn all_periods() -> Self {
        Self::default()
    }

    /// Require sales in at least `periods` distinct periods
    pub fn at_least(periods: usize) -> Self {
        Self {
            min_positive_periods: Some(periods),
        }
    }

    /// Apply the filter. Excluded pairs are a policy outcome, not an error.
    pub fn apply(&self, observations: Vec<Observation>) -> (Vec<Observation>, FilterSummary) {
        let base_month = observations.iter().map(|o| month_index(o.date)).min().unwrap_or(0);
        let period_of = |o: &Observation| o.period.unwrap_or_else(|| month_index(o.date) - base_month);

        let all_periods: HashSet<i64> = observations.iter().map(period_of).collect();
        let required = self.min_positive_periods.unwrap_or(all_periods.len());

        let mut positive: HashMap<Pair, HashSet<i64>> = HashMap::new();
        for o in &observations {
            let entry = positive
                .entry((o.shop_id.clone(), o.item_id.clone()))
                .or_default();
            if o.quantity > 0.0 {
                entry.insert(period_of(o));
            }
        }

        let qualifying: HashSet<&Pair> = positive
            .iter()
            .filter(|(_, periods)| periods.len() >= required)
            .map(|(pair, _)| pair)
            .collect();

        let summary = FilterSummary {
            required_periods: required,
            kept_pairs: qualifying.len(),
            dropped_pairs: positive.len() - qualifying.len(),
        };

        let kept: Vec<Observation> = observations
            .iter()
            .filter(|o| qualifying.contains(&(o.shop_id.clone(), o.item_id.clone())))
            .cloned()
            .collect();

        if summary.kept_pairs == 0 && summary.dropped_pairs > 0 {
            warn!(
                required = required,
                dropped = summary.dropped_pairs,
                "completeness filter excluded every series"
            );
        } else {
            info!(
                required = required,
                kept = summary.kept_pairs,
                dropped = summary.dropped_pairs,
                "applied completeness filter"
            );
        }

        (kept, summary)
    }
}

/// Fills calendar gaps so every bottom series spans the same daily range
#[derive(Debug, Clone)]
pub struct SeriesCompleter {
    scope: PairScope,
    shop_column: String,
    item_column: String,
}

impl Default for SeriesCompleter {
    fn default() -> Self {
        Self::new(PairScope::Global)
    }
}

impl SeriesCompleter {
    pub fn new(scope: PairScope) -> Self {
        Self {
            scope,
            shop_column: "shop_id".to_string(),
            item_column: "item_id".to_string(),
        }
    }

    /// Override the key column names of the completed frame
    pub fn with_columns(mut self, shop_column: &str, item_column: &str) -> Self {
        self.shop_column = shop_column.to_string();
        self.item_column = item_column.to_string();
        self
    }

    pub fn scope(&self) -> PairScope {
        self.scope
    }

    /// Expand observations over `[min date, max date]` and the selected
    /// shop/item pairs; days without a record get quantity 0. Several
    /// records for the same day and pair are summed.
    pub fn complete(&self, observations: &[Observation]) -> Result<BottomFrame> {
        let (start, end) = match (
            observations.iter().map(|o| o.date).min(),
            observations.iter().map(|o| o.date).max(),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(HtsError::DataError(
                    "Cannot complete an empty set of observations".to_string(),
                ))
            }
        };
        let calendar = daily_calendar(start, end);

        let pairs: BTreeSet<Pair> = match self.scope {
            PairScope::Global => {
                let shops: BTreeSet<&KeyValue> = observations.iter().map(|o| &o.shop_id).collect();
                let items: BTreeSet<&KeyValue> = observations.iter().map(|o| &o.item_id).collect();
                shops
                    .iter()
                    .flat_map(|shop| items.iter().map(move |item| ((*shop).clone(), (*item).clone())))
                    .collect()
            }
            PairScope::Observed => observations
                .iter()
                .map(|o| (o.shop_id.clone(), o.item_id.clone()))
                .collect(),
        };

        debug!(
            days = calendar.len(),
            pairs = pairs.len(),
            scope = ?self.scope,
            "expanding sales calendar"
        );

        let mut grid: BTreeMap<Pair, Vec<f64>> = pairs
            .into_iter()
            .map(|pair| (pair, vec![0.0; calendar.len()]))
            .collect();

        for o in observations {
            let day = (o.date - start).num_days() as usize;
            if let Some(values) = grid.get_mut(&(o.shop_id.clone(), o.item_id.clone())) {
                values[day] += o.quantity;
            }
        }

        let series: Vec<BottomSeries> = grid
            .into_iter()
            .map(|((shop, item), values)| BottomSeries {
                key: SeriesKey::new(vec![shop, item]),
                values,
            })
            .collect();

        info!(
            series = series.len(),
            days = calendar.len(),
            "completed bottom-level series"
        );

        BottomFrame::new(
            vec![self.shop_column.clone(), self.item_column.clone()],
            calendar,
            series,
        )
    }
}
