//! Hour-of-day standard deviation tables
//!
//! Non-quantile model families estimate forecast uncertainty from the
//! spread of their validation residuals, keyed by hour of day since load
//! variability follows the daily usage pattern.

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use crate::models::{FeatureMatrix, LoadModel};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;

/// Standard deviation per hour of day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardDeviationTable {
    stdev: Vec<f64>,
}

impl StandardDeviationTable {
    /// Build from per-row values grouped by hour; hours without enough
    /// samples are filled by linear interpolation over the present hours.
    pub fn from_values(hours: &[u32], values: &[f64]) -> Self {
        let mut grouped: Vec<Vec<f64>> = vec![Vec::new(); HOURS_PER_DAY];
        for (&hour, &value) in hours.iter().zip(values.iter()) {
            if !value.is_nan() {
                grouped[hour as usize % HOURS_PER_DAY].push(value);
            }
        }

        let mut stdev: Vec<f64> = grouped
            .iter()
            .map(|samples| sample_stdev(samples).unwrap_or(f64::NAN))
            .collect();
        fill_gaps(&mut stdev);
        Self { stdev }
    }

    /// Interpolated standard deviation for an hour of day
    pub fn stdev_for_hour(&self, hour: u32) -> f64 {
        self.stdev[hour as usize % HOURS_PER_DAY]
    }
}

fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Replace NaN entries by linear interpolation between the nearest present
/// hours; series that are entirely NaN become zero.
fn fill_gaps(stdev: &mut [f64]) {
    let present: Vec<usize> = (0..stdev.len()).filter(|&h| !stdev[h].is_nan()).collect();
    if present.is_empty() {
        for value in stdev.iter_mut() {
            *value = 0.0;
        }
        return;
    }

    for h in 0..stdev.len() {
        if !stdev[h].is_nan() {
            continue;
        }
        let before = present.iter().rev().find(|&&p| p < h);
        let after = present.iter().find(|&&p| p > h);
        stdev[h] = match (before, after) {
            (Some(&b), Some(&a)) => {
                let fraction = (h - b) as f64 / (a - b) as f64;
                stdev[b] + (stdev[a] - stdev[b]) * fraction
            }
            (Some(&b), None) => stdev[b],
            (None, Some(&a)) => stdev[a],
            (None, None) => 0.0,
        };
    }
}

/// Attaches a residual-based standard deviation table to a fitted model
#[derive(Debug)]
pub struct StandardDeviationGenerator<'a> {
    validation_data: &'a TimeSeriesTable,
}

impl<'a> StandardDeviationGenerator<'a> {
    pub fn new(validation_data: &'a TimeSeriesTable) -> Self {
        Self { validation_data }
    }

    /// Compute validation residuals and store their hourly spread on the model
    pub fn generate_standard_deviation_data(&self, model: &mut LoadModel) -> Result<()> {
        if self.validation_data.is_empty() {
            return Err(ForecastError::InsufficientData(
                "Validation data is empty, cannot estimate standard deviation".to_string(),
            ));
        }

        let x = FeatureMatrix::from_table(self.validation_data, &model.feature_names)?;
        let predicted = model.predict(&x)?;
        let actual = self.validation_data.load()?;
        let residuals: Vec<f64> = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| a - p)
            .collect();

        let hours = self.validation_data.hours_of_day();
        model.standard_deviation = Some(StandardDeviationTable::from_values(&hours, &residuals));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn constant_spread_gives_constant_table() {
        let hours: Vec<u32> = (0..240).map(|i| (i / 10) as u32 % 24).collect();
        let values: Vec<f64> = (0..240).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let table = StandardDeviationTable::from_values(&hours, &values);
        for hour in 0..24 {
            assert_approx_eq!(table.stdev_for_hour(hour), table.stdev_for_hour(0), 1e-9);
        }
    }

    #[test]
    fn missing_hours_are_interpolated() {
        // samples only for hours 0 and 2
        let hours = vec![0, 0, 0, 2, 2, 2];
        let values = vec![-1.0, 0.0, 1.0, -3.0, 0.0, 3.0];
        let table = StandardDeviationTable::from_values(&hours, &values);
        let low = table.stdev_for_hour(0);
        let high = table.stdev_for_hour(2);
        assert_approx_eq!(table.stdev_for_hour(1), (low + high) / 2.0, 1e-9);
    }
}
