use chrono::NaiveDate;
use hts_forecast::data::{BottomFrame, BottomSeries};
use hts_forecast::error::HtsError;
use hts_forecast::forecast::ForecastMatrix;
use hts_forecast::hierarchy::{Hierarchy, HierarchyBuilder, HierarchySpec};
use hts_forecast::keys::SeriesKey;
use hts_forecast::output::OutputProjector;
use hts_forecast::reconcile::{ReconciledTable, Reconciler};
use hts_forecast::utils::{daily_calendar, future_dates};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const COLUMNS: [&str; 3] = ["total", "shop_id", "item_id"];

fn build(bottom: Vec<(&str, &str, Vec<f64>)>) -> Hierarchy {
    let start = NaiveDate::from_ymd_opt(2013, 3, 1).unwrap();
    let days = bottom[0].2.len() as i64;
    let series = bottom
        .into_iter()
        .map(|(shop, item, values)| BottomSeries {
            key: [shop, item].into_iter().collect(),
            values,
        })
        .collect();
    let frame = BottomFrame::new(
        vec!["shop_id".to_string(), "item_id".to_string()],
        daily_calendar(start, start + chrono::Duration::days(days - 1)),
        series,
    )
    .unwrap()
    .with_constant_column("total", "Total")
    .unwrap();
    HierarchyBuilder::build(&frame, &HierarchySpec::new(&COLUMNS).unwrap()).unwrap()
}

/// Naive last-value forecasts reconciled with the default settings
fn reconcile(hierarchy: &Hierarchy, horizon: usize) -> ReconciledTable {
    let values: Vec<Vec<f64>> = hierarchy
        .series
        .values
        .iter()
        .map(|v| vec![v[v.len() - 1]; horizon])
        .collect();
    let forecasts = ForecastMatrix {
        model: "Naive".to_string(),
        keys: hierarchy.series.keys.clone(),
        dates: future_dates(*hierarchy.series.calendar.last().unwrap(), horizon),
        fitted: vec![None; values.len()],
        values,
    };
    Reconciler::default()
        .reconcile(&forecasts, &hierarchy.series, &hierarchy.summing, &hierarchy.tags)
        .unwrap()
}

#[test]
fn test_bottom_level_projection() {
    let hierarchy = build(vec![
        ("25", "2552", vec![1.0, 2.0]),
        ("25", "2554", vec![0.0, 1.0]),
        ("7", "2552", vec![3.0, 3.0]),
    ]);
    let table = reconcile(&hierarchy, 2);

    let output = OutputProjector::new(&COLUMNS)
        .unwrap()
        .project(&table, &hierarchy.tags, None)
        .unwrap();

    assert_eq!(output.columns, vec!["total", "shop_id", "item_id"]);
    assert_eq!(output.forecast_column, "Naive");
    assert_eq!(output.reconciled_column, "Naive/MinTrace_method-ols_nonnegative-True");
    assert_eq!(output.len(), 6);
    assert_eq!(output.rows[0].keys, vec!["Total", "25", "2552"]);
    assert_eq!(output.rows[0].ds, NaiveDate::from_ymd_opt(2013, 3, 3).unwrap());
    assert_eq!(output.rows[5].keys, vec!["Total", "7", "2552"]);

    // rejoining the split columns gives back the series id
    for row in &output.rows {
        let rejoined: SeriesKey = row.keys.iter().collect();
        assert!(hierarchy.tags.bottom().unwrap().keys.contains(&rejoined));
    }
}

#[test]
fn test_intermediate_level_projection() {
    let hierarchy = build(vec![("25", "1", vec![1.0]), ("7", "1", vec![2.0])]);
    let table = reconcile(&hierarchy, 1);

    let output = OutputProjector::new(&COLUMNS)
        .unwrap()
        .project(&table, &hierarchy.tags, Some("total/shop_id"))
        .unwrap();

    assert_eq!(output.columns, vec!["total", "shop_id"]);
    let shops: Vec<&str> = output.rows.iter().map(|r| r.keys[1].as_str()).collect();
    assert_eq!(shops, vec!["25", "7"]);

    let err = OutputProjector::new(&COLUMNS)
        .unwrap()
        .project(&table, &hierarchy.tags, Some("total/region"))
        .unwrap_err();
    assert!(matches!(err, HtsError::InvalidParameter(_)));
}

#[test]
fn test_separator_inside_key_fails_split() {
    let hierarchy = build(vec![("north/25", "1", vec![1.0]), ("7", "1", vec![2.0])]);
    let table = reconcile(&hierarchy, 1);

    let err = OutputProjector::new(&COLUMNS)
        .unwrap()
        .project(&table, &hierarchy.tags, None)
        .unwrap_err();

    match err {
        HtsError::KeySplit {
            unique_id,
            expected,
            found,
        } => {
            assert_eq!(unique_id, "Total/north/25/1");
            assert_eq!(expected, 3);
            assert_eq!(found, 4);
        }
        other => panic!("Expected KeySplit, got {:?}", other),
    }
}

#[test]
fn test_dataframe_and_csv() {
    let hierarchy = build(vec![("25", "1", vec![1.0, 1.0]), ("7", "1", vec![2.0, 2.0])]);
    let table = reconcile(&hierarchy, 3);
    let output = OutputProjector::new(&COLUMNS)
        .unwrap()
        .project(&table, &hierarchy.tags, None)
        .unwrap();

    let df = output.to_dataframe().unwrap();
    assert_eq!(df.shape(), (6, 6));
    assert_eq!(
        df.get_column_names(),
        vec![
            "total",
            "shop_id",
            "item_id",
            "ds",
            "Naive",
            "Naive/MinTrace_method-ols_nonnegative-True"
        ]
    );

    let dir = tempdir().unwrap();
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_opt(7, 8, 9)
        .unwrap();
    let path = output.write_csv(dir.path(), timestamp).unwrap();

    assert_eq!(path.file_name().unwrap(), "predictions_20240506_070809.csv");
    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(reader.headers().unwrap().len(), 6);
    assert_eq!(reader.records().count(), 6);
}
