use hts_forecast::error::HtsError;
use hts_math::MathError;
use std::error::Error;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match HtsError::from(io_error) {
        HtsError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let math_error = MathError::SingularMatrix("pivot 0".to_string());
    match HtsError::from(math_error) {
        HtsError::Math(MathError::SingularMatrix(msg)) => assert_eq!(msg, "pivot 0"),
        other => panic!("Expected Math variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<Vec<f64>>("[1,").unwrap_err();
    assert!(matches!(HtsError::from(json_error), HtsError::JsonError(_)));
}

#[test]
fn test_error_display() {
    let error = HtsError::KeySplit {
        unique_id: "Total/a/b/1".to_string(),
        expected: 3,
        found: 4,
    };
    let message = error.to_string();
    assert!(message.contains("Total/a/b/1"));
    assert!(message.contains("3 components"));

    let error = HtsError::SingularMatrix {
        level: "total/shop_id".to_string(),
        message: "rank deficient".to_string(),
    };
    assert!(error.to_string().contains("level 'total/shop_id'"));
}

#[test]
fn test_stage_keeps_source() {
    let error = HtsError::DataError("Missing required column 'date'".to_string()).in_stage("prep");

    assert!(error.to_string().starts_with("Stage 'prep' failed"));
    let source = error.source().unwrap();
    assert!(source.to_string().contains("Missing required column 'date'"));
}

#[test]
fn test_only_transient_errors_retry() {
    let transient = HtsError::Transient {
        series_id: "Total".to_string(),
        message: "timeout".to_string(),
    };
    let permanent = HtsError::ForecastingError {
        series_id: "Total".to_string(),
        message: "empty history".to_string(),
    };
    assert!(transient.is_transient());
    assert!(!permanent.is_transient());
    assert!(!transient.in_stage("infer").is_transient());
}
