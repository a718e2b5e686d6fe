//! Shared helpers for the integration tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use load_forecast::data::{date_range, TimeSeriesTable};
use load_forecast::jobs::PredictionJob;
use load_forecast::models::ModelType;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub const TEST_PID: u32 = 307;

/// Start of the synthetic series, aligned to the 15 minute grid
pub fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

/// Synthetic load series at 15 minute resolution: a daily and a weekly
/// pattern plus seeded Gaussian noise
pub fn synthetic_load_table(days: i64) -> TimeSeriesTable {
    let start = series_start();
    let stamps = date_range(
        start,
        start + Duration::days(days) - Duration::minutes(15),
        Duration::minutes(15),
    );

    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let load: Vec<f64> = stamps
        .iter()
        .map(|t| {
            let day_fraction = (t.timestamp() % 86_400) as f64 / 86_400.0;
            let week_fraction = (t.timestamp() % (7 * 86_400)) as f64 / (7.0 * 86_400.0);
            let daily = (2.0 * std::f64::consts::PI * day_fraction).sin();
            let weekly = 0.4 * (2.0 * std::f64::consts::PI * week_fraction).cos();
            10.0 + 3.0 * daily + weekly + noise.sample(&mut rng)
        })
        .collect();

    TimeSeriesTable::from_columns(stamps, vec![("load", load)]).unwrap()
}

pub fn demand_job(model: ModelType) -> PredictionJob {
    let mut job = PredictionJob::new(TEST_PID, "test_customer", model);
    job.description = "integration test target".to_string();
    job.quantiles = vec![0.10, 0.50, 0.90];
    job
}

/// A forecast time inside the synthetic series, leaving history behind it
pub fn forecast_time(days: i64) -> DateTime<Utc> {
    series_start() + Duration::days(days)
}
