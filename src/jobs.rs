//! Prediction job and model specification types

use crate::models::ModelType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration for one forecasting target.
///
/// A prediction job is immutable for the duration of a pipeline invocation;
/// callers own it and pass it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionJob {
    /// Unique identifier of the prediction job
    pub id: u32,
    /// Customer name the forecast is produced for
    pub name: String,
    /// Human readable description of the forecast target
    pub description: String,
    /// Model family used for this job
    pub model: ModelType,
    /// Forecast type tag stamped onto output rows
    pub forecast_type: String,
    /// Time resolution of the forecast in minutes
    pub resolution_minutes: u32,
    /// Forecast horizon in minutes
    pub horizon_minutes: u32,
    /// Quantiles to attach to the forecast
    pub quantiles: Vec<f64>,
}

impl PredictionJob {
    /// Create a job with the default demand settings: 15 minute resolution,
    /// 48 hour horizon and a symmetric quantile set.
    pub fn new(id: u32, name: &str, model: ModelType) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            model,
            forecast_type: "demand".to_string(),
            resolution_minutes: 15,
            horizon_minutes: 2880,
            quantiles: vec![0.05, 0.10, 0.30, 0.50, 0.70, 0.90, 0.95],
        }
    }
}

/// Mutable model specification persisted next to a trained model.
///
/// The trainer fills `feature_names` after fitting; the hyperparameter map
/// is an arbitrary keyword bag filtered per model family before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpecification {
    /// Prediction job id this specification belongs to
    pub id: u32,
    /// Feature columns the model was trained on; None means use all
    pub feature_names: Option<Vec<String>>,
    /// Hyperparameter bag specific to the model family
    pub hyper_params: Map<String, Value>,
}

impl ModelSpecification {
    /// Basic specification seeded only with the job id
    pub fn new(id: u32) -> Self {
        Self {
            id,
            feature_names: None,
            hyper_params: Map::new(),
        }
    }
}
