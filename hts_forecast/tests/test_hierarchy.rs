use chrono::NaiveDate;
use hts_forecast::data::{BottomFrame, BottomSeries};
use hts_forecast::error::HtsError;
use hts_forecast::hierarchy::{HierarchyBuilder, HierarchySpec, SummingMatrix};
use hts_forecast::keys::{KeyValue, SeriesKey};
use hts_forecast::utils::daily_calendar;
use hts_math::DMatrix;
use pretty_assertions::assert_eq;

fn calendar(days: u32) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2013, 1, days).unwrap();
    daily_calendar(start, end)
}

fn key(parts: &[&str]) -> SeriesKey {
    parts.iter().collect()
}

fn frame(columns: &[&str], series: Vec<(Vec<&str>, Vec<f64>)>) -> BottomFrame {
    let days = series[0].1.len() as u32;
    let series = series
        .into_iter()
        .map(|(k, values)| BottomSeries {
            key: key(&k),
            values,
        })
        .collect();
    BottomFrame::new(
        columns.iter().map(|c| c.to_string()).collect(),
        calendar(days),
        series,
    )
    .unwrap()
}

#[test]
fn test_two_shop_total() {
    let bottom = frame(
        &["shop_id"],
        vec![(vec!["A"], vec![1.0, 2.0]), (vec!["B"], vec![3.0, 4.0])],
    )
    .with_constant_column("total", "Total")
    .unwrap();
    let spec = HierarchySpec::new(&["total", "shop_id"]).unwrap();

    let hierarchy = HierarchyBuilder::build(&bottom, &spec).unwrap();

    assert_eq!(
        hierarchy.series.keys,
        vec![key(&["Total"]), key(&["Total", "A"]), key(&["Total", "B"])]
    );
    assert_eq!(hierarchy.series.get(&key(&["Total"])), Some(&[4.0, 6.0][..]));

    let expected = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    assert_eq!(hierarchy.summing.to_dense(), expected);
    assert_eq!(hierarchy.summing.shape(), (3, 2));
    assert!(hierarchy.summing.has_bottom_identity());

    let levels: Vec<&str> = hierarchy.tags.levels().collect();
    assert_eq!(levels, vec!["total", "total/shop_id"]);
    assert_eq!(
        hierarchy.tags.get("total/shop_id").unwrap(),
        &[key(&["Total", "A"]), key(&["Total", "B"])]
    );
}

#[test]
fn test_three_level_ordering_and_coherence() {
    let bottom = frame(
        &["total", "shop_id", "item_id"],
        vec![
            (vec!["Total", "7", "2"], vec![1.0, 0.0, 2.0]),
            (vec!["Total", "25", "1"], vec![0.0, 3.0, 1.0]),
            (vec!["Total", "7", "1"], vec![5.0, 1.0, 0.0]),
            (vec!["Total", "25", "9"], vec![2.0, 2.0, 2.0]),
        ],
    );
    let spec = HierarchySpec::new(&["total", "shop_id", "item_id"]).unwrap();
    let hierarchy = HierarchyBuilder::build(&bottom, &spec).unwrap();

    let rendered: Vec<String> = hierarchy.series.keys.iter().map(SeriesKey::render).collect();
    assert_eq!(
        rendered,
        vec![
            "Total",
            "Total/25",
            "Total/7",
            "Total/25/1",
            "Total/25/9",
            "Total/7/1",
            "Total/7/2",
        ]
    );
    assert_eq!(hierarchy.n_series(), 7);
    assert_eq!(hierarchy.n_bottom(), 4);
    assert!(hierarchy.summing.has_bottom_identity());

    // every row equals the sum of its bottom series on every day
    let offset = hierarchy.summing.bottom_offset();
    for t in 0..3 {
        let bottom_day: Vec<f64> = (0..4).map(|j| hierarchy.series.values[offset + j][t]).collect();
        let aggregated = hierarchy.summing.aggregate(&bottom_day).unwrap();
        for (i, expected) in aggregated.iter().enumerate() {
            assert_eq!(hierarchy.series.values[i][t], *expected);
        }
    }
    assert_eq!(hierarchy.series.values[0], vec![8.0, 6.0, 5.0]);
    assert_eq!(hierarchy.tags.level_of(&key(&["Total", "7"])), Some("total/shop_id"));
}

#[test]
fn test_missing_keys_form_their_own_series() {
    let mut bottom = frame(
        &["total", "shop_id"],
        vec![(vec!["Total", "A"], vec![1.0]), (vec!["Total", "B"], vec![2.0])],
    );
    let missing = BottomSeries {
        key: SeriesKey::new(vec![KeyValue::from("Total"), KeyValue::Missing]),
        values: vec![4.0],
    };
    let mut series = bottom.series().to_vec();
    series.push(missing);
    bottom = BottomFrame::new(bottom.columns().to_vec(), bottom.calendar().to_vec(), series).unwrap();

    let spec = HierarchySpec::new(&["total", "shop_id"]).unwrap();
    let hierarchy = HierarchyBuilder::build(&bottom, &spec).unwrap();

    assert_eq!(hierarchy.n_bottom(), 3);
    assert_eq!(hierarchy.series.values[0], vec![7.0]);
    assert!(hierarchy
        .series
        .keys
        .iter()
        .any(|k| k.render() == "Total/NA"));
}

#[test]
fn test_unknown_column_is_rejected() {
    let bottom = frame(&["total", "shop_id"], vec![(vec!["Total", "A"], vec![1.0])]);
    let spec = HierarchySpec::new(&["total", "region"]).unwrap();
    let err = HierarchyBuilder::build(&bottom, &spec).unwrap_err();
    assert!(matches!(err, HtsError::DataError(msg) if msg.contains("region")));
}

#[test]
fn test_spec_validation() {
    let empty: [&str; 0] = [];
    assert!(HierarchySpec::new(&empty).is_err());
    assert!(HierarchySpec::new(&["total", "shop_id", "total"]).is_err());

    let spec = HierarchySpec::new(&["total", "shop_id", "item_id"]).unwrap();
    let names: Vec<String> = spec.levels().into_iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["total", "total/shop_id", "total/shop_id/item_id"]);
    assert_eq!(spec.bottom_level_name(), "total/shop_id/item_id");
}

#[test]
fn test_summing_matrix_validation() {
    assert!(SummingMatrix::new(3, vec![vec![0], vec![1]]).is_err());
    assert!(SummingMatrix::new(1, vec![vec![0, 1], vec![0]]).is_err());

    let summing = SummingMatrix::new(2, vec![vec![0, 1], vec![0], vec![1]]).unwrap();
    assert_eq!(summing.aggregate(&[2.0, 3.0]).unwrap(), vec![5.0, 2.0, 3.0]);
    assert!(summing.aggregate(&[1.0]).is_err());
    assert!(summing.get(0, 1));
    assert!(!summing.get(1, 1));
}

#[test]
fn test_hierarchy_shallower_than_frame_sums_items() {
    let bottom = frame(
        &["total", "shop_id", "item_id"],
        vec![
            (vec!["Total", "A", "x"], vec![1.0, 2.0]),
            (vec!["Total", "A", "y"], vec![3.0, 4.0]),
            (vec!["Total", "B", "x"], vec![5.0, 5.0]),
        ],
    );
    let spec = HierarchySpec::new(&["total", "shop_id"]).unwrap();

    let hierarchy = HierarchyBuilder::build(&bottom, &spec).unwrap();

    assert_eq!(hierarchy.n_bottom(), 2);
    assert_eq!(hierarchy.series.get(&key(&["Total", "A"])), Some(&[4.0, 6.0][..]));
    assert_eq!(hierarchy.series.get(&key(&["Total"])), Some(&[9.0, 11.0][..]));
    assert!(hierarchy.summing.has_bottom_identity());
}

#[test]
fn test_duplicate_series_rejected_when_columns_match() {
    let bottom = frame(
        &["total", "shop_id"],
        vec![(vec!["Total", "A"], vec![1.0]), (vec!["Total", "A"], vec![2.0])],
    );
    let spec = HierarchySpec::new(&["total", "shop_id"]).unwrap();
    let err = HierarchyBuilder::build(&bottom, &spec).unwrap_err();
    assert!(matches!(err, HtsError::DataError(msg) if msg.contains("Duplicate")));
}

#[test]
fn test_missing_key_clashing_with_literal_na_is_rejected() {
    let bottom = frame(&["total", "shop_id"], vec![(vec!["Total", "NA"], vec![1.0])]);
    let mut series = bottom.series().to_vec();
    series.push(BottomSeries {
        key: SeriesKey::new(vec![KeyValue::from("Total"), KeyValue::Missing]),
        values: vec![2.0],
    });
    let bottom = BottomFrame::new(bottom.columns().to_vec(), bottom.calendar().to_vec(), series).unwrap();
    let spec = HierarchySpec::new(&["total", "shop_id"]).unwrap();

    let err = HierarchyBuilder::build(&bottom, &spec).unwrap_err();

    assert!(matches!(err, HtsError::DataError(msg) if msg.contains("Total/NA") && msg.contains("ambiguous")));
}
