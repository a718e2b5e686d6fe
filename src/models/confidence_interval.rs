//! Confidence interval synthesis
//!
//! Attaches one `quantile_P<NN>` column per requested quantile to a point
//! forecast. Quantile model families predict each quantile directly; the
//! other families use a Gaussian approximation around the point forecast
//! with the model's hour-of-day standard deviation table.

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use crate::models::{FeatureMatrix, LoadModel, StandardDeviationTable};
use statrs::distribution::{ContinuousCDF, Normal};

/// Column name for a quantile, e.g. `quantile_P10` for 0.10
pub fn quantile_column_name(quantile: f64) -> String {
    format!("quantile_P{:02}", (quantile * 100.0).round() as u32)
}

/// Attaches per-quantile forecast columns for a fitted model
#[derive(Debug)]
pub struct ConfidenceIntervalApplicator<'a> {
    model: &'a LoadModel,
    /// Feature table covering the forecast rows, used by the quantile path
    forecast_input: &'a TimeSeriesTable,
}

impl<'a> ConfidenceIntervalApplicator<'a> {
    pub fn new(model: &'a LoadModel, forecast_input: &'a TimeSeriesTable) -> Self {
        Self {
            model,
            forecast_input,
        }
    }

    /// Return a new forecast table with quantile columns attached.
    /// The input table is not modified; row order and index are preserved.
    pub fn add_confidence_interval(
        &self,
        forecast: &TimeSeriesTable,
        quantiles: &[f64],
    ) -> Result<TimeSeriesTable> {
        if self.model.model_type.supports_quantile_output() {
            self.add_quantiles_quantile_regression(forecast, quantiles)
        } else {
            let stdev = self.model.standard_deviation.as_ref().ok_or_else(|| {
                ForecastError::ValidationError(
                    "Model carries no standard deviation table".to_string(),
                )
            })?;
            add_quantiles_gaussian(forecast, stdev, quantiles)
        }
    }

    fn add_quantiles_quantile_regression(
        &self,
        forecast: &TimeSeriesTable,
        quantiles: &[f64],
    ) -> Result<TimeSeriesTable> {
        let x = FeatureMatrix::from_table(self.forecast_input, &self.model.feature_names)?;
        let mut result = forecast.clone();
        for &quantile in quantiles {
            let values = self.model.predict_quantile(&x, quantile)?;
            if values.len() != forecast.height() {
                return Err(ForecastError::DataError(format!(
                    "Quantile prediction length ({}) doesn't match forecast rows ({})",
                    values.len(),
                    forecast.height()
                )));
            }
            // the median is the forecast
            if (quantile - 0.5).abs() < 1e-9 {
                result = result.with_column("forecast", values.clone())?;
            }
            result = result.with_column(&quantile_column_name(quantile), values)?;
        }
        Ok(result)
    }
}

/// Gaussian-approximation path: forecast ± z(q) × stdev(hour of day).
/// Also used by the basecase pipeline with a historically derived table.
pub fn add_quantiles_gaussian(
    forecast: &TimeSeriesTable,
    stdev: &StandardDeviationTable,
    quantiles: &[f64],
) -> Result<TimeSeriesTable> {
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let point = forecast.column_as_f64("forecast")?;
    let hours = forecast.hours_of_day();

    let mut result = forecast.clone();
    for &quantile in quantiles {
        if !(0.0..1.0).contains(&quantile) || quantile == 0.0 {
            return Err(ForecastError::ValidationError(format!(
                "Quantile {} is outside (0, 1)",
                quantile
            )));
        }
        let z = normal.inverse_cdf(quantile);
        let values: Vec<f64> = point
            .iter()
            .zip(hours.iter())
            .map(|(p, &h)| p + z * stdev.stdev_for_hour(h))
            .collect();
        result = result.with_column(&quantile_column_name(quantile), values)?;
    }
    Ok(result)
}
