//! Factory for constructing unfitted models by family tag
//!
//! Hyperparameter bags are filtered against a static per-family key table:
//! unknown keys are dropped silently, never rejected. Permissiveness here
//! is deliberate so callers can pass one shared bag to every family.

use crate::error::Result;
use crate::models::{
    GradientBoostingRegressor, HistGradientBoostingRegressor, LoadModel, ModelType,
    QuantileGradientBoostingRegressor, Regressor, RegressorKind,
};
use serde_json::{Map, Value};

/// Hyperparameter keys each family accepts
fn valid_model_kwargs(model_type: ModelType) -> &'static [&'static str] {
    match model_type {
        ModelType::Xgb => &[
            "n_estimators",
            "learning_rate",
            "max_depth",
            "min_child_weight",
            "subsample",
            "random_state",
        ],
        ModelType::Lgb => &[
            "n_estimators",
            "learning_rate",
            "max_depth",
            "min_child_weight",
            "subsample",
            "max_bins",
            "random_state",
        ],
        ModelType::XgbQuantile => &[
            "quantiles",
            "n_estimators",
            "learning_rate",
            "max_depth",
            "min_child_weight",
            "subsample",
            "random_state",
        ],
    }
}

/// Factory object for creating machine learning models
#[derive(Debug)]
pub struct ModelCreator;

impl ModelCreator {
    /// Create an unfitted model for the given family tag.
    ///
    /// Fails with a not-implemented error when the tag is not registered;
    /// keys in `kwargs` that the family does not accept are dropped.
    pub fn create_model_from_tag(tag: &str, kwargs: &Map<String, Value>) -> Result<LoadModel> {
        Self::create_model(ModelType::from_tag(tag)?, kwargs)
    }

    /// Create an unfitted model for the given family
    pub fn create_model(model_type: ModelType, kwargs: &Map<String, Value>) -> Result<LoadModel> {
        let filtered: Map<String, Value> = kwargs
            .iter()
            .filter(|(key, _)| valid_model_kwargs(model_type).contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut regressor = match model_type {
            ModelType::Xgb => RegressorKind::Xgb(GradientBoostingRegressor::new()),
            ModelType::Lgb => RegressorKind::Lgb(HistGradientBoostingRegressor::new()),
            ModelType::XgbQuantile => {
                RegressorKind::XgbQuantile(QuantileGradientBoostingRegressor::new(Vec::new()))
            }
        };

        match &mut regressor {
            RegressorKind::Xgb(r) => r.set_params(&filtered)?,
            RegressorKind::Lgb(r) => r.set_params(&filtered)?,
            RegressorKind::XgbQuantile(r) => r.set_params(&filtered)?,
        }

        Ok(LoadModel::new(model_type, regressor))
    }
}
