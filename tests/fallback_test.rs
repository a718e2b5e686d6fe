mod common;

use chrono::Duration;
use load_forecast::data::{date_range, TimeSeriesTable};
use load_forecast::error::ForecastError;
use load_forecast::models::fallback::generate_fallback;

fn forecast_index(n: usize) -> Vec<chrono::DateTime<chrono::Utc>> {
    let start = common::series_start() + Duration::days(30);
    date_range(
        start,
        start + Duration::minutes(15 * (n as i64 - 1)),
        Duration::minutes(15),
    )
}

#[test]
fn fallback_repeats_the_extreme_day_profile() {
    let load_table = common::synthetic_load_table(14);
    let index = forecast_index(192);

    let forecast = generate_fallback(&index, &load_table, "extreme_day").unwrap();

    assert_eq!(forecast.timestamps(), index);
    let values = forecast.column_as_f64("forecast").unwrap();
    assert_eq!(values.len(), index.len());
    assert!(values.iter().all(|v| !v.is_nan()));

    // Same time of day means same forecast, one day apart
    assert_eq!(values[0], values[96]);
}

#[test]
fn all_missing_load_is_an_error() {
    let stamps = forecast_index(96);
    let load_table =
        TimeSeriesTable::from_columns(stamps.clone(), vec![("load", vec![f64::NAN; 96])])
            .unwrap();

    let err = generate_fallback(&stamps, &load_table, "extreme_day").unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
}

#[test]
fn unknown_strategy_is_not_implemented() {
    let load_table = common::synthetic_load_table(7);
    let err = generate_fallback(&forecast_index(96), &load_table, "rainy_day").unwrap_err();
    match err {
        ForecastError::NotImplemented(msg) => assert!(msg.contains("rainy_day")),
        other => panic!("Expected NotImplemented, got {:?}", other),
    }
}
