//! Horizon-aware feature engineering
//!
//! Derives lag and time-of-day features from the load series. Training
//! tables get one block of rows per horizon with the horizon (in hours)
//! appended as the last column; operational tables carry no horizon column.

use crate::data::{TimeSeriesTable, HORIZON_COLUMN, LOAD_COLUMN};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Lag features available to the applicators: name and backward offset.
///
/// Minute lags capture near-term autocorrelation, day lags capture the
/// daily and weekly load patterns.
pub fn lag_feature_catalog() -> Vec<(String, Duration)> {
    let mut catalog = Vec::new();
    for minutes in [15i64, 30, 45, 60] {
        catalog.push((format!("T-{}min", minutes), Duration::minutes(minutes)));
    }
    for days in [1i64, 2, 3, 7, 14] {
        catalog.push((format!("T-{}d", days), Duration::days(days)));
    }
    catalog
}

/// Time-of-day features that do not depend on the load series
const CYCLIC_FEATURES: [&str; 2] = ["hour_sin", "hour_cos"];

/// Feature applicator for training: one row block per horizon,
/// `load` first and `horizon` last.
#[derive(Debug)]
pub struct TrainFeatureApplicator {
    horizons: Vec<f64>,
    feature_names: Option<Vec<String>>,
}

/// Feature applicator for operational and basecase prediction:
/// a single near-term horizon and no horizon column.
#[derive(Debug)]
pub struct OperationalFeatureApplicator {
    horizons: Vec<f64>,
    feature_names: Vec<String>,
}

impl TrainFeatureApplicator {
    pub fn new(horizons: Vec<f64>, feature_names: Option<Vec<String>>) -> Self {
        Self {
            horizons,
            feature_names,
        }
    }

    /// Add features to a validated input table.
    ///
    /// The result contains, per horizon, every input row with lag features
    /// that are not available at that horizon blanked to NaN.
    pub fn add_features(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
        let base = compute_base_features(table)?;
        let feature_names = match &self.feature_names {
            Some(names) => names
                .iter()
                .filter(|n| *n != LOAD_COLUMN && *n != HORIZON_COLUMN)
                .cloned()
                .collect(),
            None => base
                .data_column_names()
                .into_iter()
                .filter(|n| n != LOAD_COLUMN)
                .collect::<Vec<String>>(),
        };

        let lag_minutes: HashMap<String, i64> = lag_feature_catalog()
            .into_iter()
            .map(|(name, lag)| (name, lag.num_minutes()))
            .collect();

        let mut result: Option<TimeSeriesTable> = None;
        for &horizon in &self.horizons {
            let mut frame = base.select_data(
                &std::iter::once(LOAD_COLUMN.to_string())
                    .chain(feature_names.iter().cloned())
                    .collect::<Vec<String>>(),
            )?;

            // A lag shorter than the horizon would peek past forecast time
            let horizon_minutes = (horizon * 60.0).round() as i64;
            for name in &feature_names {
                if let Some(&lag) = lag_minutes.get(name) {
                    if lag < horizon_minutes {
                        frame = frame.with_column(name, vec![f64::NAN; frame.height()])?;
                    }
                }
            }

            let frame = frame.with_column(HORIZON_COLUMN, vec![horizon; frame.height()])?;
            result = Some(match result {
                Some(acc) => acc.vstack(&frame)?,
                None => frame,
            });
        }

        result.ok_or_else(|| {
            ForecastError::ValidationError("At least one training horizon is required".to_string())
        })
    }
}

impl OperationalFeatureApplicator {
    pub fn new(horizons: Vec<f64>, feature_names: Vec<String>) -> Self {
        Self {
            horizons,
            feature_names,
        }
    }

    /// Add the model's feature columns to a prediction input table
    pub fn add_features(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
        if self.horizons.len() != 1 {
            return Err(ForecastError::ValidationError(format!(
                "Operational prediction expects exactly one horizon, got {}",
                self.horizons.len()
            )));
        }
        let base = compute_base_features(table)?;
        let names: Vec<String> = self
            .feature_names
            .iter()
            .filter(|n| *n != LOAD_COLUMN && *n != HORIZON_COLUMN)
            .cloned()
            .collect();
        for name in &names {
            if !base.has_column(name) {
                return Err(ForecastError::DataError(format!(
                    "Requested feature '{}' cannot be derived",
                    name
                )));
            }
        }
        base.select_data(
            &std::iter::once(LOAD_COLUMN.to_string())
                .chain(names)
                .collect::<Vec<String>>(),
        )
    }
}

/// Compute the full feature set: load, all lag features and cyclic
/// time-of-day features.
fn compute_base_features(table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
    let load = table.load()?;
    let timestamps = table.timestamps();

    let by_time: HashMap<i64, f64> = timestamps
        .iter()
        .zip(load.iter())
        .map(|(t, v)| (t.timestamp_millis(), *v))
        .collect();

    let mut result = table.select_data(&[LOAD_COLUMN.to_string()])?;

    // Exogenous columns from the input (weather etc.) are carried through
    for name in table.data_column_names() {
        if name != LOAD_COLUMN {
            result = result.with_column(&name, table.column_as_f64(&name)?)?;
        }
    }

    for (name, lag) in lag_feature_catalog() {
        let lag_ms = lag.num_milliseconds();
        let values: Vec<f64> = timestamps
            .iter()
            .map(|t| {
                by_time
                    .get(&(t.timestamp_millis() - lag_ms))
                    .copied()
                    .unwrap_or(f64::NAN)
            })
            .collect();
        result = result.with_column(&name, values)?;
    }

    let hour_fraction: Vec<f64> = timestamps
        .iter()
        .map(|t| {
            let seconds = t.timestamp() % 86_400;
            seconds as f64 / 86_400.0
        })
        .collect();
    result = result.with_column(
        CYCLIC_FEATURES[0],
        hour_fraction.iter().map(|f| (2.0 * PI * f).sin()).collect(),
    )?;
    result = result.with_column(
        CYCLIC_FEATURES[1],
        hour_fraction.iter().map(|f| (2.0 * PI * f).cos()).collect(),
    )?;

    Ok(result)
}

/// Reindex a table onto a regular timestamp grid; rows absent from the
/// input become NaN. Used to extend prediction input into the future.
pub fn reindex_to_grid(
    table: &TimeSeriesTable,
    grid: &[DateTime<Utc>],
) -> Result<TimeSeriesTable> {
    let timestamps = table.timestamps();
    let positions: HashMap<i64, usize> = timestamps
        .iter()
        .enumerate()
        .map(|(i, t)| (t.timestamp_millis(), i))
        .collect();

    let mut columns = Vec::new();
    for name in table.data_column_names() {
        let values = table.column_as_f64(&name)?;
        let regridded: Vec<f64> = grid
            .iter()
            .map(|t| {
                positions
                    .get(&t.timestamp_millis())
                    .map(|&i| values[i])
                    .unwrap_or(f64::NAN)
            })
            .collect();
        columns.push((name, regridded));
    }

    let named: Vec<(&str, Vec<f64>)> = columns
        .iter()
        .map(|(name, values)| (name.as_str(), values.clone()))
        .collect();
    TimeSeriesTable::from_columns(grid.to_vec(), named)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::date_range;
    use chrono::TimeZone;

    fn table(days: i64) -> TimeSeriesTable {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let stamps = date_range(
            start,
            start + Duration::days(days) - Duration::minutes(15),
            Duration::minutes(15),
        );
        let load: Vec<f64> = (0..stamps.len()).map(|i| (i % 96) as f64).collect();
        TimeSeriesTable::from_columns(stamps, vec![("load", load)]).unwrap()
    }

    #[test]
    fn train_features_have_load_first_and_horizon_last() {
        let applicator = TrainFeatureApplicator::new(vec![0.25, 47.0], None);
        let features = applicator.add_features(&table(16)).unwrap();
        let names = features.data_column_names();
        assert_eq!(names.first().unwrap(), LOAD_COLUMN);
        assert_eq!(names.last().unwrap(), HORIZON_COLUMN);
        // one row block per horizon
        assert_eq!(features.height(), 2 * 16 * 96);
    }

    #[test]
    fn operational_features_have_no_horizon() {
        let applicator =
            OperationalFeatureApplicator::new(vec![0.25], vec!["T-1d".to_string()]);
        let features = applicator.add_features(&table(16)).unwrap();
        assert!(!features.has_column(HORIZON_COLUMN));
        assert_eq!(features.data_column_names(), vec!["load", "T-1d"]);
    }

    #[test]
    fn day_lag_matches_value_one_day_back() {
        let applicator =
            OperationalFeatureApplicator::new(vec![0.25], vec!["T-1d".to_string()]);
        let features = applicator.add_features(&table(3)).unwrap();
        let load = features.load().unwrap();
        let lag = features.column_as_f64("T-1d").unwrap();
        assert!(lag[0].is_nan());
        assert_eq!(lag[96], load[0]);
    }

    #[test]
    fn short_lags_are_blanked_for_long_horizons() {
        let applicator = TrainFeatureApplicator::new(vec![47.0], None);
        let features = applicator.add_features(&table(16)).unwrap();
        let minute_lag = features.column_as_f64("T-15min").unwrap();
        assert!(minute_lag.iter().all(|v| v.is_nan()));
        let two_day_lag = features.column_as_f64("T-2d").unwrap();
        assert!(two_day_lag.iter().any(|v| !v.is_nan()));
    }
}
