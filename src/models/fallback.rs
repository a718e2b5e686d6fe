//! Model-free fallback forecasts for degraded input data

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Generate a forecast covering `forecast_index` from the historical load
/// series alone.
///
/// The only implemented strategy is `"extreme_day"`: the historical day
/// with the highest peak load is selected and its time-of-day profile is
/// repeated over the requested index.
pub fn generate_fallback(
    forecast_index: &[DateTime<Utc>],
    load_table: &TimeSeriesTable,
    fallback_strategy: &str,
) -> Result<TimeSeriesTable> {
    if fallback_strategy != "extreme_day" {
        return Err(ForecastError::NotImplemented(format!(
            "Unknown fallback strategy '{}'",
            fallback_strategy
        )));
    }

    let load = load_table.load()?;
    let timestamps = load_table.timestamps();
    if load.iter().all(|v| v.is_nan()) {
        return Err(ForecastError::DataError(
            "Load series contains no usable data".to_string(),
        ));
    }

    // Day with the highest single load value
    let (peak_row, _) = load
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .expect("at least one usable value");
    let extreme_day = timestamps[peak_row].date_naive();

    // Profile of that day keyed by seconds since midnight
    let mut profile: HashMap<u32, f64> = HashMap::new();
    for (t, &v) in timestamps.iter().zip(load.iter()) {
        if t.date_naive() == extreme_day && !v.is_nan() {
            profile.insert(seconds_of_day(t), v);
        }
    }
    let profile_mean = profile.values().sum::<f64>() / profile.len() as f64;

    let forecast: Vec<f64> = forecast_index
        .iter()
        .map(|t| {
            profile
                .get(&seconds_of_day(t))
                .copied()
                .unwrap_or(profile_mean)
        })
        .collect();

    TimeSeriesTable::from_columns(forecast_index.to_vec(), vec![("forecast", forecast)])
}

fn seconds_of_day(t: &DateTime<Utc>) -> u32 {
    (t.timestamp().rem_euclid(86_400)) as u32
}
