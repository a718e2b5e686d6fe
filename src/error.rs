//! Error types for the load_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the load_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input data is empty or too small after validation and cleaning
    #[error("Insufficient input data: {0}")]
    InsufficientData(String),

    /// The load column is not first or the horizon column is not last
    #[error("Wrong column order: {0}")]
    WrongColumnOrder(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Requested model family or strategy is not registered
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Error related to data content or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// No stored model exists for the requested prediction job
    #[error("No model found for prediction job {0}")]
    ModelNotFound(u32),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from serializing or deserializing model artifacts
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
