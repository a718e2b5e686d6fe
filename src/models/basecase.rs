//! Parameter-free historical analog model for basecase forecasts

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};

/// Predicts the load of one week earlier, falling back to two weeks
/// earlier when the one-week lag is missing. Requires a feature table with
/// `T-7d` and `T-14d` columns; no fitting involved.
#[derive(Debug, Default)]
pub struct BaseCaseModel;

impl BaseCaseModel {
    pub fn new() -> Self {
        Self
    }

    pub fn predict(&self, forecast_input: &TimeSeriesTable) -> Result<Vec<f64>> {
        if !forecast_input.has_column("T-7d") || !forecast_input.has_column("T-14d") {
            return Err(ForecastError::DataError(
                "Basecase prediction requires the T-7d and T-14d features".to_string(),
            ));
        }
        let week = forecast_input.column_as_f64("T-7d")?;
        let two_weeks = forecast_input.column_as_f64("T-14d")?;

        Ok(week
            .iter()
            .zip(two_weeks.iter())
            .map(|(w, t)| if w.is_nan() { *t } else { *w })
            .collect())
    }
}
