use approx::assert_relative_eq;
use chrono::NaiveDate;
use hts_forecast::error::{HtsError, Result};
use hts_forecast::forecast::{forecast_hierarchy, RetryPolicy};
use hts_forecast::hierarchy::AggregatedSeries;
use hts_forecast::keys::SeriesKey;
use hts_forecast::models::{
    AutoEts, Forecaster, ForecasterSpec, History, SeriesForecast, WindowAverage,
};
use hts_forecast::utils::daily_calendar;
use std::sync::atomic::{AtomicUsize, Ordering};

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    daily_calendar(start, start + chrono::Duration::days(n as i64 - 1))
}

#[test]
fn test_auto_ets_constant_series() {
    let values = vec![5.0; 20];
    let calendar = dates(values.len());
    let history = History::new(&calendar, &values).unwrap();

    let forecast = AutoEts::new().forecast("Total", history, 4, 7).unwrap();

    assert_eq!(forecast.horizon(), 4);
    for value in forecast.values() {
        assert_relative_eq!(*value, 5.0, epsilon = 1e-9);
    }
    assert_eq!(forecast.fitted().unwrap().len(), values.len());
}

#[test]
fn test_auto_ets_follows_trend() {
    let values: Vec<f64> = (0..20).map(|t| t as f64).collect();
    let calendar = dates(values.len());
    let history = History::new(&calendar, &values).unwrap();

    let forecast = AutoEts::new().forecast("Total", history, 3, 7).unwrap();

    assert_relative_eq!(forecast.values()[0], 20.0, epsilon = 1e-6);
    assert_relative_eq!(forecast.values()[2], 22.0, epsilon = 1e-6);
}

#[test]
fn test_auto_ets_picks_up_weekly_pattern() {
    let profile = [1.0, 1.0, 1.0, 1.0, 1.0, 6.0, 8.0];
    let values: Vec<f64> = (0..56).map(|t| profile[t % 7]).collect();
    let calendar = dates(values.len());
    let history = History::new(&calendar, &values).unwrap();

    let forecast = AutoEts::new().forecast("Total/7", history, 7, 7).unwrap();

    // the weekend peak reappears in the right position
    let peak = forecast
        .values()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 6);
    assert_relative_eq!(forecast.values()[0], 1.0, epsilon = 0.5);
}

#[test]
fn test_auto_ets_short_history() {
    let values = vec![3.0, 5.0];
    let calendar = dates(values.len());
    let history = History::new(&calendar, &values).unwrap();

    let forecast = AutoEts::new().forecast("Total/1/1", history, 2, 30).unwrap();
    assert_eq!(forecast.horizon(), 2);
    assert_relative_eq!(forecast.values()[0], 4.0, epsilon = 1e-9);
}

#[test]
fn test_auto_ets_rejects_bad_history() {
    let empty: Vec<f64> = Vec::new();
    let history = History::new(&[], &empty).unwrap();
    assert!(matches!(
        AutoEts::new().forecast("Total", history, 1, 7),
        Err(HtsError::ForecastingError { .. })
    ));

    let values = vec![1.0, f64::NAN, 2.0];
    let calendar = dates(3);
    let history = History::new(&calendar, &values).unwrap();
    assert!(matches!(
        AutoEts::new().forecast("Total", history, 1, 7),
        Err(HtsError::DataError(_))
    ));

    assert!(History::new(&calendar, &values[..2]).is_err());
}

#[test]
fn test_window_average() {
    let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let calendar = dates(values.len());
    let history = History::new(&calendar, &values).unwrap();
    let model = WindowAverage::new(3).unwrap();

    let forecast = model.forecast("Total", history, 2, 7).unwrap();

    assert_eq!(model.name(), "WindowAverage3");
    assert_eq!(forecast.values(), &[4.0, 4.0]);
    assert_eq!(forecast.fitted().unwrap(), &[1.0, 1.0, 1.5, 2.0, 3.0]);
    assert_relative_eq!(forecast.mean_absolute_error(&[5.0, 3.0]).unwrap(), 1.0);
}

#[test]
fn test_window_average_validation() {
    assert!(WindowAverage::new(0).is_err());

    let values = vec![1.0, 2.0];
    let calendar = dates(2);
    let history = History::new(&calendar, &values).unwrap();
    let err = WindowAverage::new(3)
        .unwrap()
        .forecast("Total/2", history, 1, 7)
        .unwrap_err();
    assert!(matches!(err, HtsError::ForecastingError { series_id, .. } if series_id == "Total/2"));
}

#[test]
fn test_series_forecast_length_check() {
    assert!(SeriesForecast::new(vec![1.0, 2.0], 3).is_err());
    assert!(SeriesForecast::new(vec![1.0, 2.0], 2).is_ok());
}

#[test]
fn test_forecaster_spec_serde() {
    let spec: ForecasterSpec = serde_json::from_str(r#"{"model":"window_average","window":7}"#).unwrap();
    assert_eq!(spec, ForecasterSpec::WindowAverage { window: 7 });
    assert_eq!(spec.build().unwrap().name(), "WindowAverage7");

    let json = serde_json::to_string(&ForecasterSpec::default()).unwrap();
    assert_eq!(json, r#"{"model":"auto_ets"}"#);

    assert!(ForecasterSpec::WindowAverage { window: 0 }.build().is_err());
}

/// Fails transiently a fixed number of times, then forecasts the last value
#[derive(Debug)]
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
    transient: bool,
}

impl Forecaster for Flaky {
    fn name(&self) -> &str {
        "Flaky"
    }

    fn forecast(
        &self,
        series_id: &str,
        history: History<'_>,
        horizon: usize,
        _season_length: usize,
    ) -> Result<SeriesForecast> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            let message = "worker busy".to_string();
            let series_id = series_id.to_string();
            return Err(if self.transient {
                HtsError::Transient { series_id, message }
            } else {
                HtsError::ForecastingError { series_id, message }
            });
        }
        let last = history.values[history.len() - 1];
        SeriesForecast::new(vec![last; horizon], horizon)
    }
}

fn single_series() -> AggregatedSeries {
    AggregatedSeries {
        calendar: dates(3),
        keys: vec![["Total"].into_iter().collect::<SeriesKey>()],
        values: vec![vec![1.0, 2.0, 3.0]],
    }
}

#[test]
fn test_transient_failures_are_retried() {
    let flaky = Flaky {
        failures: 2,
        calls: AtomicUsize::new(0),
        transient: true,
    };
    let retry = RetryPolicy {
        max_retries: 2,
        delay_ms: 0,
    };

    let matrix = forecast_hierarchy(&flaky, &single_series(), 2, 7, &retry).unwrap();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert_eq!(matrix.values, vec![vec![3.0, 3.0]]);
    assert_eq!(matrix.model, "Flaky");
    assert_eq!(matrix.dates, vec![
        NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(),
    ]);
}

#[test]
fn test_permanent_failures_are_not_retried() {
    let flaky = Flaky {
        failures: 1,
        calls: AtomicUsize::new(0),
        transient: false,
    };

    let err = forecast_hierarchy(&flaky, &single_series(), 2, 7, &RetryPolicy::default()).unwrap_err();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, HtsError::ForecastingError { .. }));
}

#[test]
fn test_zero_horizon_is_rejected() {
    let err = forecast_hierarchy(&AutoEts::new(), &single_series(), 0, 7, &RetryPolicy::none())
        .unwrap_err();
    assert!(matches!(err, HtsError::InvalidParameter(_)));
}
