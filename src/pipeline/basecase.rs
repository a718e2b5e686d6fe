//! Basecase prediction pipeline
//!
//! Produces a model-free forecast for lead times beyond the regular
//! forecast horizon, out to two weeks ahead. The forecast is the load of
//! one (or two) weeks earlier with a Gaussian confidence interval derived
//! from the historic hour-of-day load spread.

use crate::data::{date_range, TimeSeriesTable};
use crate::error::Result;
use crate::features::{reindex_to_grid, OperationalFeatureApplicator};
use crate::jobs::PredictionJob;
use crate::models::basecase::BaseCaseModel;
use crate::models::confidence_interval::add_quantiles_gaussian;
use crate::models::StandardDeviationTable;
use crate::pipeline::predict::add_prediction_job_properties_to_forecast;
use chrono::{DateTime, Duration, Utc};
use polars::prelude::DataFrame;

/// Lead time covered by a basecase forecast
pub const BASECASE_HORIZON_MINUTES: i64 = 60 * 24 * 14;

pub const BASECASE_RESOLUTION_MINUTES: i64 = 15;

const BASECASE_FEATURES: [&str; 2] = ["T-7d", "T-14d"];

/// Run the basecase pipeline at the current wall clock time
pub fn basecase_pipeline(
    job: &PredictionJob,
    input_data: &TimeSeriesTable,
) -> Result<DataFrame> {
    basecase_pipeline_at(job, input_data, Utc::now())
}

/// Run the basecase pipeline with an explicit forecast time.
///
/// The forecast starts where the job's regular horizon ends and runs out to
/// [`BASECASE_HORIZON_MINUTES`] ahead.
pub fn basecase_pipeline_at(
    job: &PredictionJob,
    input_data: &TimeSeriesTable,
    now: DateTime<Utc>,
) -> Result<DataFrame> {
    let resolution = Duration::minutes(BASECASE_RESOLUTION_MINUTES);
    let forecast_start = now + Duration::minutes(job.horizon_minutes as i64);
    let forecast_end = now + Duration::minutes(BASECASE_HORIZON_MINUTES);

    // Grid from two weeks back so the T-14d lag resolves over the whole
    // forecast window
    let grid = date_range(now - Duration::days(15), forecast_end, resolution);
    let regridded = reindex_to_grid(input_data, &grid)?;

    let feature_names: Vec<String> = BASECASE_FEATURES.iter().map(|s| s.to_string()).collect();
    let applicator = OperationalFeatureApplicator::new(vec![0.25], feature_names);
    let features = applicator.add_features(&regridded)?;
    let forecast_input = features.filter_time_range(forecast_start, forecast_end)?;

    let values = BaseCaseModel::new().predict(&forecast_input)?;
    let forecast =
        TimeSeriesTable::from_columns(forecast_input.timestamps(), vec![("forecast", values)])?;

    // Uncertainty comes from the historic load spread, not model residuals
    let load = input_data.load()?;
    let hours = input_data.hours_of_day();
    let stdev = StandardDeviationTable::from_values(&hours, &load);
    let forecast = add_quantiles_gaussian(&forecast, &stdev, &job.quantiles)?;

    let mut basecase_job = job.clone();
    basecase_job.forecast_type = "basecase".to_string();
    add_prediction_job_properties_to_forecast(
        &forecast,
        &basecase_job,
        "basecase",
        Some("not_renewed"),
    )
}
