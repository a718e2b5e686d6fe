//! Train/validation/test splitting with peak-aware stratification
//!
//! Naive random splitting under-samples rare peak-load events, which are
//! the operationally critical regime to forecast accurately. The stratified
//! mode therefore partitions local load extrema separately from the
//! remaining rows so both train and validation sets see their share.

use crate::data::{TimeSeriesTable, LOAD_COLUMN};
use crate::error::{ForecastError, Result};
use rand::seq::SliceRandom;

/// Parameters controlling the split
#[derive(Debug, Clone)]
pub struct SplitParams {
    /// Fraction of rows reserved for the test set
    pub test_fraction: f64,
    /// Fraction of rows reserved for the validation set
    pub validation_fraction: f64,
    /// When set, the test set is the most recent contiguous slice
    pub back_test: bool,
    /// When set, split peaks proportionally between train and validation
    pub stratification_min_max: bool,
    /// Half-width of the peak detector window, in rows
    pub peak_window: usize,
    /// Minimum difference between an extremum and the opposite side of its
    /// window for it to count as a peak
    pub min_peak_prominence: f64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            test_fraction: 0.1,
            validation_fraction: 0.15,
            back_test: false,
            stratification_min_max: true,
            peak_window: 8,
            min_peak_prominence: 0.0,
        }
    }
}

/// Output of `split_data_train_validation_test`
#[derive(Debug)]
pub struct SplitDataSets {
    /// Row indices of all detected load peaks (maxima and minima)
    pub peaks: Vec<usize>,
    /// Peaks assigned to the validation set
    pub validation_peaks: Vec<usize>,
    /// Peaks assigned to the train set
    pub train_peaks: Vec<usize>,
    pub train: TimeSeriesTable,
    pub validation: TimeSeriesTable,
    pub test: TimeSeriesTable,
}

/// Split a feature table into train, validation and test subsets.
///
/// See `SplitParams` for the supported modes. An empty input produces empty
/// outputs; fractions summing to one or more are a caller error.
pub fn split_data_train_validation_test(
    table: &TimeSeriesTable,
    params: &SplitParams,
) -> Result<SplitDataSets> {
    if params.test_fraction + params.validation_fraction >= 1.0 {
        return Err(ForecastError::ValidationError(format!(
            "test_fraction ({}) and validation_fraction ({}) must sum to less than 1",
            params.test_fraction, params.validation_fraction
        )));
    }

    let n = table.height();
    if n == 0 {
        return Ok(SplitDataSets {
            peaks: Vec::new(),
            validation_peaks: Vec::new(),
            train_peaks: Vec::new(),
            train: TimeSeriesTable::empty(),
            validation: TimeSeriesTable::empty(),
            test: TimeSeriesTable::empty(),
        });
    }

    let mut rng = rand::thread_rng();
    let test_len = (params.test_fraction * n as f64).round() as usize;

    let (test_indices, mut remaining) = if params.back_test {
        let test: Vec<usize> = (n - test_len..n).collect();
        let rest: Vec<usize> = (0..n - test_len).collect();
        (test, rest)
    } else {
        let mut all: Vec<usize> = (0..n).collect();
        all.shuffle(&mut rng);
        let mut test: Vec<usize> = all[..test_len].to_vec();
        let mut rest: Vec<usize> = all[test_len..].to_vec();
        test.sort_unstable();
        rest.sort_unstable();
        (test, rest)
    };

    let validation_len = (params.validation_fraction * n as f64).round() as usize;

    let (peaks, validation_peaks, train_peaks, train_indices, validation_indices) =
        if params.stratification_min_max {
            let load = if table.has_column(LOAD_COLUMN) {
                table.load()?
            } else {
                Vec::new()
            };
            let peaks: Vec<usize> = find_peaks(&load, params.peak_window, params.min_peak_prominence)
                .into_iter()
                .filter(|i| remaining.binary_search(i).is_ok())
                .collect();

            // Validation share of the peaks, remainder to train
            let n_validation_peaks = (peaks.len() as f64 * params.validation_fraction).round()
                as usize;
            let mut shuffled = peaks.clone();
            shuffled.shuffle(&mut rng);
            let mut validation_peaks: Vec<usize> = shuffled[..n_validation_peaks].to_vec();
            let mut train_peaks: Vec<usize> = shuffled[n_validation_peaks..].to_vec();
            validation_peaks.sort_unstable();
            train_peaks.sort_unstable();

            // Non-peak rows are split by the same fractions independently
            let mut non_peaks: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|i| peaks.binary_search(i).is_err())
                .collect();
            non_peaks.shuffle(&mut rng);
            let n_validation_rest = validation_len
                .saturating_sub(n_validation_peaks)
                .min(non_peaks.len());

            let mut validation_indices: Vec<usize> = non_peaks[..n_validation_rest].to_vec();
            validation_indices.extend(&validation_peaks);
            validation_indices.sort_unstable();

            let mut train_indices: Vec<usize> = non_peaks[n_validation_rest..].to_vec();
            train_indices.extend(&train_peaks);
            train_indices.sort_unstable();

            (
                peaks,
                validation_peaks,
                train_peaks,
                train_indices,
                validation_indices,
            )
        } else if params.back_test {
            // Contiguous split: validation is the most recent remaining slice
            let validation_len = validation_len.min(remaining.len());
            let split_at = remaining.len() - validation_len;
            let validation_indices = remaining.split_off(split_at);
            (Vec::new(), Vec::new(), Vec::new(), remaining, validation_indices)
        } else {
            remaining.shuffle(&mut rng);
            let validation_len = validation_len.min(remaining.len());
            let mut validation_indices: Vec<usize> = remaining[..validation_len].to_vec();
            let mut train_indices: Vec<usize> = remaining[validation_len..].to_vec();
            validation_indices.sort_unstable();
            train_indices.sort_unstable();
            (Vec::new(), Vec::new(), Vec::new(), train_indices, validation_indices)
        };

    Ok(SplitDataSets {
        peaks,
        validation_peaks,
        train_peaks,
        train: table.take_rows(&train_indices)?,
        validation: table.take_rows(&validation_indices)?,
        test: table.take_rows(&test_indices)?,
    })
}

/// Find local extrema of a load series.
///
/// A row is a peak when its value is strictly the largest (or smallest)
/// within `window` rows on either side and the spread across that window
/// is at least `min_prominence`. NaN values never qualify.
pub fn find_peaks(values: &[f64], window: usize, min_prominence: f64) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();

    for i in 0..n {
        let value = values[i];
        if value.is_nan() {
            continue;
        }
        let lo = i.saturating_sub(window);
        let hi = (i + window + 1).min(n);

        let mut is_max = true;
        let mut is_min = true;
        let mut neighborhood_min = f64::INFINITY;
        let mut neighborhood_max = f64::NEG_INFINITY;
        for (j, &other) in values[lo..hi].iter().enumerate() {
            if lo + j == i || other.is_nan() {
                continue;
            }
            if other >= value {
                is_max = false;
            }
            if other <= value {
                is_min = false;
            }
            neighborhood_min = neighborhood_min.min(other);
            neighborhood_max = neighborhood_max.max(other);
        }

        let prominent_max = is_max && value - neighborhood_min >= min_prominence;
        let prominent_min = is_min && neighborhood_max - value >= min_prominence;
        if neighborhood_min.is_finite() && (prominent_max || prominent_min) {
            peaks.push(i);
        }
    }

    peaks
}
