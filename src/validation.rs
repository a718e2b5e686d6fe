//! Input data validation and cleaning
//!
//! Repairs the time index, flags flatliner periods and decides whether a
//! table carries enough usable load data to train or predict on.

use crate::data::{TimeSeriesTable, LOAD_COLUMN};
use crate::error::Result;
use log::warn;

/// Minimum number of rows for a table to be considered sufficient
/// (one week at 15 minute resolution)
pub const MINIMAL_TABLE_LENGTH: usize = 96 * 7;

/// Minimum fraction of non-missing load values
pub const COMPLETENESS_THRESHOLD: f64 = 0.5;

/// Number of repeated identical non-zero load values that marks a flatliner
pub const FLATLINER_THRESHOLD: usize = 24;

/// Validate a raw input table: sort the index, drop duplicate timestamps and
/// replace flatliner periods with NaN.
pub fn validate(pid: u32, table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
    if table.is_empty() {
        return Ok(table.clone());
    }

    // Repair the monotonic index invariant
    let stamps = table.timestamps();
    let mut order: Vec<usize> = (0..stamps.len()).collect();
    order.sort_by_key(|&i| stamps[i]);
    order.dedup_by_key(|i| stamps[*i]);
    let sorted = table.take_rows(&order)?;

    if !sorted.has_column(LOAD_COLUMN) {
        return Ok(sorted);
    }

    // Repeated identical non-zero measurements indicate a broken meter
    let (load, replaced) = replace_flatliners(&sorted.load()?, FLATLINER_THRESHOLD);
    if replaced > 0 {
        warn!(
            "Found flatliner data points for pid {}, converted {} rows to NaN",
            pid, replaced
        );
    }
    sorted.with_column(LOAD_COLUMN, load)
}

/// Drop rows with a missing load value
pub fn clean(table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
    if table.is_empty() || !table.has_column(LOAD_COLUMN) {
        return Ok(table.clone());
    }
    let load = table.load()?;
    let keep: Vec<usize> = load
        .iter()
        .enumerate()
        .filter_map(|(i, v)| if v.is_nan() { None } else { Some(i) })
        .collect();
    table.take_rows(&keep)
}

/// Check whether a table has enough usable load data
pub fn is_data_sufficient(table: &TimeSeriesTable) -> bool {
    if table.height() < MINIMAL_TABLE_LENGTH {
        return false;
    }
    let load = match table.load() {
        Ok(load) => load,
        Err(_) => return false,
    };
    let non_missing = load.iter().filter(|v| !v.is_nan()).count();
    non_missing as f64 / load.len() as f64 >= COMPLETENESS_THRESHOLD
}

/// Replace runs of more than `threshold` identical non-zero values with NaN.
/// Returns the cleaned series and the number of replaced values.
pub fn replace_flatliners(load: &[f64], threshold: usize) -> (Vec<f64>, usize) {
    let mut cleaned = load.to_vec();
    let mut replaced = 0;

    let mut run_start = 0;
    for i in 1..=load.len() {
        let run_ended = i == load.len() || load[i] != load[run_start] || load[i].is_nan();
        if run_ended {
            let run_len = i - run_start;
            if run_len > threshold && load[run_start] != 0.0 && !load[run_start].is_nan() {
                for value in cleaned[run_start..i].iter_mut() {
                    *value = f64::NAN;
                }
                replaced += run_len;
            }
            run_start = i;
        }
    }

    (cleaned, replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatliners_are_replaced() {
        let mut load: Vec<f64> = (0..100).map(|i| i as f64 + 1.0).collect();
        for value in load[10..60].iter_mut() {
            *value = 42.0;
        }
        let (cleaned, replaced) = replace_flatliners(&load, 24);
        assert_eq!(replaced, 50);
        assert!(cleaned[10..60].iter().all(|v| v.is_nan()));
        assert!(!cleaned[9].is_nan());
        assert!(!cleaned[60].is_nan());
    }

    #[test]
    fn zero_runs_are_kept() {
        let load = vec![0.0; 100];
        let (cleaned, replaced) = replace_flatliners(&load, 24);
        assert_eq!(replaced, 0);
        assert!(cleaned.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn short_runs_are_kept() {
        let load = vec![1.0, 5.0, 5.0, 5.0, 2.0];
        let (_, replaced) = replace_flatliners(&load, 24);
        assert_eq!(replaced, 0);
    }
}
