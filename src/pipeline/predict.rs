//! Operational prediction pipeline
//!
//! Produces the stamped 48 hour forecast for a prediction job from the most
//! recent input data and a fitted model. Degraded input data falls back to
//! a model-free extreme-day forecast instead of failing the run.

use crate::data::{date_range, TimeSeriesTable};
use crate::error::Result;
use crate::features::{reindex_to_grid, OperationalFeatureApplicator};
use crate::jobs::PredictionJob;
use crate::models::confidence_interval::ConfidenceIntervalApplicator;
use crate::models::fallback::generate_fallback;
use crate::models::LoadModel;
use crate::validation;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use polars::prelude::*;

/// History carried into feature derivation, enough for the two week lag
const INPUT_HISTORY_DAYS: i64 = 14;

/// Future slack on the input grid past the forecast horizon
const INPUT_FUTURE_DAYS: i64 = 3;

/// Horizon (hours) the operational features are derived for
const OPERATIONAL_HORIZON: f64 = 0.25;

const FALLBACK_STRATEGY: &str = "extreme_day";

/// Datetime index of the rows a forecast run must produce: from one
/// resolution step before `now` to the job's horizon, on the job's grid.
pub fn generate_forecast_datetime_range(
    job: &PredictionJob,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let resolution = Duration::minutes(job.resolution_minutes as i64);
    let start = now - resolution;
    let end = now + Duration::minutes(job.horizon_minutes as i64);
    date_range(start, end, resolution)
}

/// Run the prediction pipeline at the current wall clock time
pub fn predict_pipeline(
    job: &PredictionJob,
    model: &LoadModel,
    input_data: &TimeSeriesTable,
) -> Result<DataFrame> {
    predict_pipeline_at(job, model, input_data, Utc::now())
}

/// Run the prediction pipeline with an explicit forecast time.
///
/// The returned frame has one row per forecast timestamp with the point
/// forecast, one `quantile_P<NN>` column per job quantile and the job
/// metadata columns.
pub fn predict_pipeline_at(
    job: &PredictionJob,
    model: &LoadModel,
    input_data: &TimeSeriesTable,
    now: DateTime<Utc>,
) -> Result<DataFrame> {
    let forecast_index = generate_forecast_datetime_range(job, now);
    let forecast_start = forecast_index[0];
    let forecast_end = *forecast_index.last().expect("non-empty forecast range");

    let validated = validation::validate(job.id, input_data)?;

    if !validation::is_data_sufficient(&validated) {
        warn!("Using fallback forecast for pid {}", job.id);
        let forecast = generate_fallback(&forecast_index, &validated, FALLBACK_STRATEGY)?;
        return add_prediction_job_properties_to_forecast(
            &forecast,
            job,
            "fallback",
            Some("substituted"),
        );
    }

    // Features need the full lag history plus the forecast window itself
    let resolution = Duration::minutes(job.resolution_minutes as i64);
    let grid = date_range(
        now - Duration::days(INPUT_HISTORY_DAYS),
        now + Duration::minutes(job.horizon_minutes as i64)
            + Duration::days(INPUT_FUTURE_DAYS),
        resolution,
    );
    let regridded = reindex_to_grid(&validated, &grid)?;

    let applicator =
        OperationalFeatureApplicator::new(vec![OPERATIONAL_HORIZON], model.feature_names.clone());
    let features = applicator.add_features(&regridded)?;
    let forecast_input = features.filter_time_range(forecast_start, forecast_end)?;

    let point_forecast = model.predict_table(&forecast_input)?;
    let forecast = TimeSeriesTable::from_columns(
        forecast_input.timestamps(),
        vec![("forecast", point_forecast)],
    )?;

    let forecast = ConfidenceIntervalApplicator::new(model, &forecast_input)
        .add_confidence_interval(&forecast, &job.quantiles)?;

    add_prediction_job_properties_to_forecast(&forecast, job, model.model_type.tag(), None)
}

/// Stamp job metadata onto a forecast table.
///
/// This is the terminal step of every forecast pipeline; the string columns
/// it adds mean the result is no longer a float-only time series table.
pub fn add_prediction_job_properties_to_forecast(
    forecast: &TimeSeriesTable,
    job: &PredictionJob,
    algtype: &str,
    quality: Option<&str>,
) -> Result<DataFrame> {
    let n = forecast.height();
    let mut df = forecast.dataframe().clone();

    df.with_column(Series::new("pid", vec![job.id as i64; n]))?;
    df.with_column(Series::new("customer", vec![job.name.as_str(); n]))?;
    df.with_column(Series::new("description", vec![job.description.as_str(); n]))?;
    df.with_column(Series::new("type", vec![job.forecast_type.as_str(); n]))?;
    df.with_column(Series::new("algtype", vec![algtype; n]))?;
    if let Some(quality) = quality {
        df.with_column(Series::new("quality", vec![quality; n]))?;
    }
    Ok(df)
}
