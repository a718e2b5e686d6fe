mod common;

use assert_approx_eq::assert_approx_eq;
use chrono::Duration;
use load_forecast::data::{date_range, TimeSeriesTable};
use load_forecast::models::confidence_interval::{add_quantiles_gaussian, quantile_column_name};
use load_forecast::models::StandardDeviationTable;

fn flat_forecast(n: usize, value: f64) -> TimeSeriesTable {
    let start = common::series_start();
    let stamps = date_range(
        start,
        start + Duration::minutes(15 * (n as i64 - 1)),
        Duration::minutes(15),
    );
    TimeSeriesTable::from_columns(stamps, vec![("forecast", vec![value; n])]).unwrap()
}

/// Constant stdev for every hour of day
fn constant_stdev(sigma: f64) -> StandardDeviationTable {
    let hours: Vec<u32> = (0..24).flat_map(|h| [h, h, h]).collect();
    let values: Vec<f64> = (0..24)
        .flat_map(|_| [-sigma, 0.0, sigma])
        .collect();
    // sample stdev of {-s, 0, s} is s
    StandardDeviationTable::from_values(&hours, &values)
}

#[test]
fn gaussian_quantiles_are_symmetric_about_the_forecast() {
    let forecast = flat_forecast(96, 100.0);
    let stdev = constant_stdev(2.0);

    let result = add_quantiles_gaussian(&forecast, &stdev, &[0.10, 0.50, 0.90]).unwrap();
    let p10 = result.column_as_f64("quantile_P10").unwrap();
    let p50 = result.column_as_f64("quantile_P50").unwrap();
    let p90 = result.column_as_f64("quantile_P90").unwrap();
    let point = result.column_as_f64("forecast").unwrap();

    for i in 0..forecast.height() {
        assert_approx_eq!(p50[i], point[i], 1e-9);
        assert_approx_eq!(point[i] - p10[i], p90[i] - point[i], 1e-9);
        assert!(p10[i] < point[i] && point[i] < p90[i]);
    }
}

#[test]
fn all_requested_quantile_columns_are_attached() {
    let forecast = flat_forecast(8, 5.0);
    let quantiles = [0.05, 0.10, 0.30, 0.50, 0.70, 0.90, 0.95];

    let result = add_quantiles_gaussian(&forecast, &constant_stdev(1.0), &quantiles).unwrap();
    for &q in &quantiles {
        assert!(result.has_column(&quantile_column_name(q)));
    }
    assert_eq!(result.height(), forecast.height());
}

#[test]
fn quantiles_outside_the_unit_interval_are_rejected() {
    let forecast = flat_forecast(8, 5.0);
    let err = add_quantiles_gaussian(&forecast, &constant_stdev(1.0), &[1.5]).unwrap_err();
    assert!(err.to_string().contains("1.5"));
}
