//! Time series table handling for load forecasting
//!
//! All tables in this crate share one layout: a `timestamp` column holding
//! UTC epoch milliseconds, followed by float data columns. Missing values
//! are encoded as NaN so every data column stays `Float64`.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Name of the mandatory time column
pub const TIME_COLUMN: &str = "timestamp";

/// Name of the target load column
pub const LOAD_COLUMN: &str = "load";

/// Name of the horizon column appended by the train feature applicator
pub const HORIZON_COLUMN: &str = "horizon";

/// Time-indexed data table for load forecasting
#[derive(Debug, Clone)]
pub struct TimeSeriesTable {
    /// Data frame containing the time series data
    df: DataFrame,
}

/// Data loader for time series tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a time series table from a CSV file.
    ///
    /// The file must contain a time column (named `timestamp`, `date` or
    /// `datetime`) holding either epoch milliseconds or RFC 3339 strings.
    /// All remaining columns are read as floats.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeriesTable> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let time_column = Self::detect_time_column(&df)?;
        let timestamps = Self::parse_time_column(&df, &time_column)?;

        let mut columns = Vec::new();
        for col in df.get_columns() {
            if col.name() == time_column {
                continue;
            }
            let values = cast_series_to_f64(col)?;
            columns.push((col.name().to_string(), values));
        }

        let named: Vec<(&str, Vec<f64>)> = columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.clone()))
            .collect();
        TimeSeriesTable::from_columns(timestamps, named)
    }

    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower = name.to_lowercase();
            if lower == TIME_COLUMN || lower.contains("date") || lower.contains("time") {
                return Ok(name.to_string());
            }
        }
        Err(ForecastError::DataError(
            "No time column found in data".to_string(),
        ))
    }

    fn parse_time_column(df: &DataFrame, name: &str) -> Result<Vec<DateTime<Utc>>> {
        let col = df.column(name)?;
        match col.dtype() {
            DataType::Int64 => Ok(col
                .i64()?
                .into_iter()
                .flatten()
                .filter_map(timestamp_from_millis)
                .collect()),
            DataType::Utf8 => {
                let mut timestamps = Vec::with_capacity(df.height());
                for value in col.utf8()?.into_iter().flatten() {
                    let parsed = value
                        .parse::<DateTime<Utc>>()
                        .or_else(|_| {
                            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
                        })
                        .map_err(|e| {
                            ForecastError::DataError(format!(
                                "Cannot parse timestamp '{}': {}",
                                value, e
                            ))
                        })?;
                    timestamps.push(parsed);
                }
                Ok(timestamps)
            }
            other => Err(ForecastError::DataError(format!(
                "Unsupported time column dtype: {}",
                other
            ))),
        }
    }
}

impl TimeSeriesTable {
    /// Create a table from timestamps and named float columns
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<(&str, Vec<f64>)>,
    ) -> Result<Self> {
        let mut series = vec![Series::new(
            TIME_COLUMN,
            timestamps
                .iter()
                .map(|t| t.timestamp_millis())
                .collect::<Vec<i64>>(),
        )];

        for (name, values) in columns {
            if values.len() != timestamps.len() {
                return Err(ForecastError::DataError(format!(
                    "Column '{}' length ({}) doesn't match index length ({})",
                    name,
                    values.len(),
                    timestamps.len()
                )));
            }
            series.push(Series::new(name, values));
        }

        let df = DataFrame::new(series)?;
        Ok(Self { df })
    }

    /// Create an empty table with only the time column
    pub fn empty() -> Self {
        let series = Series::new(TIME_COLUMN, Vec::<i64>::new());
        Self {
            df: DataFrame::new(vec![series]).expect("empty frame"),
        }
    }

    /// Wrap an existing DataFrame; the time column must be present and first
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        match df.get_column_names().first() {
            Some(&name) if name == TIME_COLUMN => Ok(Self { df }),
            _ => Err(ForecastError::DataError(format!(
                "First column must be '{}'",
                TIME_COLUMN
            ))),
        }
    }

    /// Get the underlying DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Check whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Names of the data columns, excluding the time column
    pub fn data_column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| *name != TIME_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().contains(&name)
    }

    /// Get the timestamps as UTC datetimes
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.df
            .column(TIME_COLUMN)
            .and_then(|col| col.i64())
            .map(|ca| {
                ca.into_iter()
                    .flatten()
                    .filter_map(timestamp_from_millis)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Hour of day (0-23) for every row
    pub fn hours_of_day(&self) -> Vec<u32> {
        self.timestamps().iter().map(|t| t.hour()).collect()
    }

    /// Get a data column as f64 values, nulls mapped to NaN
    pub fn column_as_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.df.column(name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", name, e))
        })?;
        cast_series_to_f64(col)
    }

    /// The target load series (first data column on well-formed tables)
    pub fn load(&self) -> Result<Vec<f64>> {
        self.column_as_f64(LOAD_COLUMN)
    }

    /// Return a new table with the given column appended or replaced
    pub fn with_column(&self, name: &str, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.height() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' length ({}) doesn't match table height ({})",
                name,
                values.len(),
                self.height()
            )));
        }
        let mut df = self.df.clone();
        df.with_column(Series::new(name, values))?;
        Ok(Self { df })
    }

    /// Return a new table containing only the named data columns, in order
    pub fn select_data(&self, names: &[String]) -> Result<Self> {
        let mut selection = vec![TIME_COLUMN.to_string()];
        selection.extend(names.iter().cloned());
        let df = self.df.select(selection)?;
        Ok(Self { df })
    }

    /// Contiguous row slice
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        Self {
            df: self.df.slice(offset as i64, len),
        }
    }

    /// Gather the given rows into a new table, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let mut series = Vec::with_capacity(self.df.width());
        for col in self.df.get_columns() {
            if col.name() == TIME_COLUMN {
                let values = col.i64()?.into_iter().flatten().collect::<Vec<i64>>();
                let taken: Vec<i64> = indices.iter().map(|&i| values[i]).collect();
                series.push(Series::new(TIME_COLUMN, taken));
            } else {
                let values = cast_series_to_f64(col)?;
                let taken: Vec<f64> = indices.iter().map(|&i| values[i]).collect();
                series.push(Series::new(col.name(), taken));
            }
        }
        Ok(Self {
            df: DataFrame::new(series)?,
        })
    }

    /// Append the rows of another table with the same columns
    pub fn vstack(&self, other: &Self) -> Result<Self> {
        Ok(Self {
            df: self.df.vstack(&other.df)?,
        })
    }

    /// Rows whose timestamp lies in `[start, end]`
    pub fn filter_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();
        let stamps = self.df.column(TIME_COLUMN)?.i64()?;
        let indices: Vec<usize> = stamps
            .into_iter()
            .enumerate()
            .filter_map(|(i, ts)| match ts {
                Some(ms) if ms >= start_ms && ms <= end_ms => Some(i),
                _ => None,
            })
            .collect();
        self.take_rows(&indices)
    }
}

/// Build a regular UTC datetime grid from `start` to `end` inclusive
pub fn date_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Vec<DateTime<Utc>> {
    let mut timestamps = Vec::new();
    let mut current = start;
    while current <= end {
        timestamps.push(current);
        current += step;
    }
    timestamps
}

fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn cast_series_to_f64(col: &Series) -> Result<Vec<f64>> {
    match col.dtype() {
        DataType::Float64 => Ok(col
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()),
        DataType::Float32 => Ok(col
            .f32()?
            .into_iter()
            .map(|v| v.map(|x| x as f64).unwrap_or(f64::NAN))
            .collect()),
        DataType::Int64 => Ok(col
            .i64()?
            .into_iter()
            .map(|v| v.map(|x| x as f64).unwrap_or(f64::NAN))
            .collect()),
        DataType::Int32 => Ok(col
            .i32()?
            .into_iter()
            .map(|v| v.map(|x| x as f64).unwrap_or(f64::NAN))
            .collect()),
        _ => Err(ForecastError::DataError(format!(
            "Column '{}' cannot be converted to f64",
            col.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamps(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::minutes(15 * i as i64)).collect()
    }

    #[test]
    fn take_rows_preserves_order_and_values() {
        let table = TimeSeriesTable::from_columns(
            stamps(5),
            vec![("load", vec![1.0, 2.0, 3.0, 4.0, 5.0])],
        )
        .unwrap();

        let taken = table.take_rows(&[4, 0, 2]).unwrap();
        assert_eq!(taken.load().unwrap(), vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn filter_time_range_is_inclusive() {
        let ts = stamps(8);
        let table = TimeSeriesTable::from_columns(
            ts.clone(),
            vec![("load", (0..8).map(|v| v as f64).collect())],
        )
        .unwrap();

        let filtered = table.filter_time_range(ts[2], ts[5]).unwrap();
        assert_eq!(filtered.height(), 4);
        assert_eq!(filtered.load().unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn nan_values_survive_round_trips() {
        let table = TimeSeriesTable::from_columns(
            stamps(3),
            vec![("load", vec![1.0, f64::NAN, 3.0])],
        )
        .unwrap();
        let load = table.load().unwrap();
        assert!(load[1].is_nan());
    }
}
