//! Metrics for evaluating forecast performance
//!
//! All metrics skip pairs where either side is NaN, since feature tables
//! routinely carry NaN lag values near series boundaries.

use crate::error::{ForecastError, Result};

fn valid_pairs<'a>(
    forecast: &'a [f64],
    actual: &'a [f64],
) -> impl Iterator<Item = (f64, f64)> + 'a {
    forecast
        .iter()
        .zip(actual.iter())
        .filter(|(f, a)| !f.is_nan() && !a.is_nan())
        .map(|(f, a)| (*f, *a))
}

/// Mean absolute error
pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(forecast, actual)?;
    let (sum, n) = valid_pairs(forecast, actual)
        .fold((0.0, 0usize), |(s, n), (f, a)| (s + (f - a).abs(), n + 1));
    if n == 0 {
        return Err(ForecastError::DataError(
            "No valid value pairs to compute MAE".to_string(),
        ));
    }
    Ok(sum / n as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(forecast, actual)?;
    let (sum, n) = valid_pairs(forecast, actual)
        .fold((0.0, 0usize), |(s, n), (f, a)| (s + (f - a).powi(2), n + 1));
    if n == 0 {
        return Err(ForecastError::DataError(
            "No valid value pairs to compute RMSE".to_string(),
        ));
    }
    Ok((sum / n as f64).sqrt())
}

/// Coefficient of determination (R²)
pub fn r_squared(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(forecast, actual)?;
    let pairs: Vec<(f64, f64)> = valid_pairs(forecast, actual).collect();
    if pairs.is_empty() {
        return Err(ForecastError::DataError(
            "No valid value pairs to compute R²".to_string(),
        ));
    }

    let mean_actual = pairs.iter().map(|(_, a)| a).sum::<f64>() / pairs.len() as f64;
    let ss_res: f64 = pairs.iter().map(|(f, a)| (a - f).powi(2)).sum();
    let ss_tot: f64 = pairs.iter().map(|(_, a)| (a - mean_actual).powi(2)).sum();

    if ss_tot == 0.0 {
        // Constant target: perfect score only for a perfect forecast
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

fn check_lengths(forecast: &[f64], actual: &[f64]) -> Result<()> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(1.0, 1.0)]
    #[case(-2.5, 2.5)]
    fn constant_shift_gives_that_mae(#[case] shift: f64, #[case] expected: f64) {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        let forecast: Vec<f64> = actual.iter().map(|v| v + shift).collect();
        assert_approx_eq!(mean_absolute_error(&forecast, &actual).unwrap(), expected);
        assert_approx_eq!(root_mean_squared_error(&forecast, &actual).unwrap(), expected);
    }

    #[test]
    fn perfect_forecast_scores_one() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(r_squared(&actual, &actual).unwrap(), 1.0);
        assert_approx_eq!(mean_absolute_error(&actual, &actual).unwrap(), 0.0);
    }

    #[test]
    fn nan_pairs_are_skipped() {
        let forecast = vec![1.0, f64::NAN, 3.0];
        let actual = vec![1.5, 2.0, 3.5];
        assert_approx_eq!(mean_absolute_error(&forecast, &actual).unwrap(), 0.5);
    }
}
