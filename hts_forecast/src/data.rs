//! Sales ingestion and the dense bottom-level series frame

use crate::error::{HtsError, Result};
use crate::keys::{KeyValue, SeriesKey};
use crate::utils::{is_contiguous, parse_date, DS_FORMAT};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// One raw daily sales record
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub shop_id: KeyValue,
    pub item_id: KeyValue,
    pub quantity: f64,
    /// Source period block (e.g. month number), if the data carries one
    pub period: Option<i64>,
}

impl Observation {
    pub fn new(date: NaiveDate, shop_id: &str, item_id: &str, quantity: f64) -> Self {
        Self {
            date,
            shop_id: KeyValue::from(shop_id),
            item_id: KeyValue::from(item_id),
            quantity,
            period: None,
        }
    }

    pub fn with_period(mut self, period: i64) -> Self {
        self.period = Some(period);
        self
    }
}

/// Column names of the raw sales file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesColumns {
    pub date: String,
    pub shop: String,
    pub item: String,
    pub quantity: String,
    /// Optional period block column
    pub period: Option<String>,
}

impl Default for SalesColumns {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            shop: "shop_id".to_string(),
            item: "item_id".to_string(),
            quantity: "item_cnt_day".to_string(),
            period: Some("date_block_num".to_string()),
        }
    }
}

/// Loader for raw sales files
#[derive(Debug)]
pub struct SalesLoader;

impl SalesLoader {
    /// Load raw sales observations from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &SalesColumns) -> Result<Vec<Observation>> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        info!(
            path = %path.as_ref().display(),
            rows = df.height(),
            "loaded raw sales"
        );
        Self::from_dataframe(&df, columns)
    }

    /// Convert an already loaded DataFrame into observations
    ///
    /// Any malformed cell fails the whole load: a bad bottom row would
    /// corrupt every aggregate built on top of it.
    pub fn from_dataframe(df: &DataFrame, columns: &SalesColumns) -> Result<Vec<Observation>> {
        let dates = string_column(df, &columns.date)?;
        let shops = string_column(df, &columns.shop)?;
        let items = string_column(df, &columns.item)?;
        let quantities = float_column(df, &columns.quantity)?;
        let periods = match &columns.period {
            Some(name) if df.get_column_names().contains(&name.as_str()) => {
                Some(int_column(df, name)?)
            }
            _ => None,
        };

        let mut observations = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let raw_date = dates[row].as_deref().ok_or_else(|| {
                HtsError::DataError(format!("Missing date in row {}", row))
            })?;
            let date = parse_date(raw_date)?;
            let quantity = quantities[row].ok_or_else(|| {
                HtsError::DataError(format!(
                    "Missing or non-numeric sales value in row {} (column '{}')",
                    row, columns.quantity
                ))
            })?;
            observations.push(Observation {
                date,
                shop_id: KeyValue::from_cell(shops[row].as_deref()),
                item_id: KeyValue::from_cell(items[row].as_deref()),
                quantity,
                period: periods.as_ref().and_then(|p| p[row]),
            });
        }

        Ok(observations)
    }
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|_| HtsError::DataError(format!("Missing required column '{}'", name)))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = required_column(df, name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = required_column(df, name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = required_column(df, name)?.cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

/// One bottom-level series aligned to the frame calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottomSeries {
    pub key: SeriesKey,
    pub values: Vec<f64>,
}

/// Dense bottom-level series sharing one daily calendar
#[derive(Debug, Clone, PartialEq)]
pub struct BottomFrame {
    columns: Vec<String>,
    calendar: Vec<NaiveDate>,
    series: Vec<BottomSeries>,
}

impl BottomFrame {
    /// Create a frame, checking calendar continuity and alignment
    pub fn new(columns: Vec<String>, calendar: Vec<NaiveDate>, series: Vec<BottomSeries>) -> Result<Self> {
        if columns.is_empty() {
            return Err(HtsError::InvalidParameter(
                "A frame needs at least one key column".to_string(),
            ));
        }
        if !is_contiguous(&calendar) {
            return Err(HtsError::DataError(
                "Calendar must be an ascending sequence of consecutive days".to_string(),
            ));
        }
        for s in &series {
            if s.key.len() != columns.len() {
                return Err(HtsError::DataError(format!(
                    "Series '{}' has {} key components, expected {}",
                    s.key,
                    s.key.len(),
                    columns.len()
                )));
            }
            if s.values.len() != calendar.len() {
                return Err(HtsError::DataError(format!(
                    "Series '{}' has {} values, calendar has {} days",
                    s.key,
                    s.values.len(),
                    calendar.len()
                )));
            }
        }

        Ok(Self {
            columns,
            calendar,
            series,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    pub fn series(&self) -> &[BottomSeries] {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Position of a key column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Prepend a constant key column, e.g. the `total` root of a hierarchy
    pub fn with_constant_column(mut self, name: &str, value: &str) -> Result<Self> {
        if self.column_index(name).is_some() {
            return Err(HtsError::InvalidParameter(format!(
                "Column '{}' already exists",
                name
            )));
        }
        self.columns.insert(0, name.to_string());
        for s in &mut self.series {
            let mut parts = Vec::with_capacity(s.key.len() + 1);
            parts.push(KeyValue::from(value));
            parts.extend(s.key.parts().iter().cloned());
            s.key = SeriesKey::new(parts);
        }
        Ok(self)
    }

    /// Flatten back to daily observations, reading shop and item from the
    /// last two key columns
    pub fn to_observations(&self) -> Result<Vec<Observation>> {
        if self.columns.len() < 2 {
            return Err(HtsError::DataError(
                "Frame needs shop and item key columns to produce observations".to_string(),
            ));
        }
        let n = self.columns.len();
        let mut observations = Vec::with_capacity(self.series.len() * self.calendar.len());
        for s in &self.series {
            let parts = s.key.parts();
            for (date, &quantity) in self.calendar.iter().zip(&s.values) {
                observations.push(Observation {
                    date: *date,
                    shop_id: parts[n - 2].clone(),
                    item_id: parts[n - 1].clone(),
                    quantity,
                    period: None,
                });
            }
        }
        Ok(observations)
    }

    /// Write the frame as a long table: key columns, `ds`, `y`
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        header.extend(["ds", "y"]);
        writer.write_record(&header)?;

        for s in &self.series {
            let key_cells: Vec<&str> = s.key.parts().iter().map(|k| k.as_str().unwrap_or("")).collect();
            for (date, value) in self.calendar.iter().zip(&s.values) {
                let mut record = key_cells.clone();
                let ds = date.format(DS_FORMAT).to_string();
                let y = value.to_string();
                record.push(&ds);
                record.push(&y);
                writer.write_record(&record)?;
            }
        }
        writer.flush()?;

        info!(
            path = %path.as_ref().display(),
            series = self.series.len(),
            days = self.calendar.len(),
            "wrote training table"
        );
        Ok(())
    }

    /// Read a long table written by [`BottomFrame::write_csv`], keyed by `columns`
    ///
    /// The table must be dense: every series covers the same gap-free
    /// calendar.
    pub fn read_csv<P: AsRef<Path>>(path: P, columns: &[String]) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();
        let index_of = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| HtsError::DataError(format!("Missing required column '{}'", name)))
        };
        let key_idx = columns
            .iter()
            .map(|c| index_of(c.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let ds_idx = index_of("ds")?;
        let y_idx = index_of("y")?;

        let mut grouped: BTreeMap<SeriesKey, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let key = SeriesKey::new(
                key_idx
                    .iter()
                    .map(|&i| KeyValue::from_cell(record.get(i)))
                    .collect(),
            );
            let date = parse_date(record.get(ds_idx).unwrap_or(""))?;
            let raw_y = record.get(y_idx).unwrap_or("").trim();
            let y: f64 = raw_y.parse().map_err(|_| {
                HtsError::DataError(format!("Non-numeric y '{}' on line {}", raw_y, line + 2))
            })?;
            if grouped.entry(key.clone()).or_default().insert(date, y).is_some() {
                return Err(HtsError::DataError(format!(
                    "Duplicate row for series '{}' on {}",
                    key, date
                )));
            }
        }

        let calendar: Vec<NaiveDate> = grouped
            .values()
            .next()
            .map(|days| days.keys().copied().collect())
            .unwrap_or_default();

        let mut series = Vec::with_capacity(grouped.len());
        for (key, days) in grouped {
            if !days.keys().eq(calendar.iter()) {
                return Err(HtsError::DataError(format!(
                    "Series '{}' does not cover the shared calendar",
                    key
                )));
            }
            series.push(BottomSeries {
                key,
                values: days.into_values().collect(),
            });
        }

        debug!(series = series.len(), days = calendar.len(), "read training table");
        Self::new(columns.to_vec(), calendar, series)
    }
}
