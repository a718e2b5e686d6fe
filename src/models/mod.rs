//! Regression models for load forecasting
//!
//! All model families share one capability surface: fit with early
//! stopping, point prediction, scoring, and a hyperparameter map. The
//! quantile family additionally produces per-quantile predictions; the
//! other families carry an hour-of-day standard deviation table instead.

use crate::data::{TimeSeriesTable, HORIZON_COLUMN, LOAD_COLUMN};
use crate::error::{ForecastError, Result};
use crate::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

pub mod basecase;
pub mod confidence_interval;
pub mod factory;
pub mod fallback;
pub mod gradient_boosting;
pub mod quantile;
pub mod standard_deviation;
mod tree;

pub use factory::ModelCreator;
pub use gradient_boosting::{GradientBoostingRegressor, HistGradientBoostingRegressor};
pub use quantile::QuantileGradientBoostingRegressor;
pub use standard_deviation::StandardDeviationTable;

/// Registered model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Gradient-boosted trees
    Xgb,
    /// Histogram-binned gradient-boosted trees
    Lgb,
    /// Gradient-boosted trees with native quantile output
    XgbQuantile,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [ModelType::Xgb, ModelType::Lgb, ModelType::XgbQuantile];

    /// String tag used in prediction jobs and the `algtype` output column
    pub fn tag(&self) -> &'static str {
        match self {
            ModelType::Xgb => "xgb",
            ModelType::Lgb => "lgb",
            ModelType::XgbQuantile => "xgb_quantile",
        }
    }

    /// Parse a tag, failing with the list of valid tags
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.tag()).collect();
                ForecastError::NotImplemented(format!(
                    "No constructor for '{}', valid model types are: {:?}",
                    tag, valid
                ))
            })
    }

    /// Whether the family natively produces distinct per-quantile output.
    /// Decides the confidence interval path; this is a declared family
    /// property, not runtime model introspection.
    pub fn supports_quantile_output(&self) -> bool {
        matches!(self, ModelType::XgbQuantile)
    }
}

/// Column-major feature matrix extracted from a feature table
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build a matrix from the named columns of a feature table
    pub fn from_table(table: &TimeSeriesTable, feature_names: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(feature_names.len());
        for name in feature_names {
            columns.push(table.column_as_f64(name)?);
        }
        Ok(Self {
            feature_names: feature_names.to_vec(),
            columns,
            n_rows: table.height(),
        })
    }

    /// Regressor input columns of a training table: everything between the
    /// leading load column and the trailing horizon column.
    pub fn regressor_columns(table: &TimeSeriesTable) -> Vec<String> {
        table
            .data_column_names()
            .into_iter()
            .filter(|n| n != LOAD_COLUMN && n != HORIZON_COLUMN)
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Value at (row, feature); NaN encodes missing
    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.columns[feature][row]
    }

    /// Full column for one feature
    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }
}

/// Result of scoring a model on a feature set.
///
/// Scoring an old model against a new feature layout can fail; that case is
/// an explicit outcome consumed by the comparison logic, not an error.
#[derive(Debug, Clone)]
pub enum ScoreOutcome {
    /// Coefficient of determination
    Score(f64),
    /// The model cannot score this feature set
    Incomparable(String),
}

/// Shared capability surface of all regressor families
pub trait Regressor: Debug {
    /// Fit on training data with early stopping against an evaluation set
    fn fit(
        &mut self,
        train: (&FeatureMatrix, &[f64]),
        eval: (&FeatureMatrix, &[f64]),
        early_stopping_rounds: usize,
    ) -> Result<()>;

    /// Point prediction
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Per-quantile prediction; only the quantile family implements this
    fn predict_quantile(&self, _x: &FeatureMatrix, quantile: f64) -> Result<Vec<f64>> {
        Err(ForecastError::NotImplemented(format!(
            "This model family has no native quantile output (requested {})",
            quantile
        )))
    }

    /// R² on the given data, or an incomparable outcome when the feature
    /// set does not match the fitted model
    fn score(&self, x: &FeatureMatrix, y: &[f64]) -> ScoreOutcome {
        match self.predict(x).and_then(|pred| metrics::r_squared(&pred, y)) {
            Ok(score) => ScoreOutcome::Score(score),
            Err(e) => ScoreOutcome::Incomparable(e.to_string()),
        }
    }

    /// Effective hyperparameters
    fn get_params(&self) -> Map<String, Value>;

    /// Apply hyperparameters; keys not known to the family are ignored
    fn set_params(&mut self, params: &Map<String, Value>) -> Result<()>;

    /// Total split gain per feature, None when the model is unfitted
    fn feature_importance(&self) -> Option<Vec<f64>>;
}

/// Serializable container over the concrete regressor families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressorKind {
    Xgb(GradientBoostingRegressor),
    Lgb(HistGradientBoostingRegressor),
    XgbQuantile(QuantileGradientBoostingRegressor),
}

impl RegressorKind {
    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            RegressorKind::Xgb(r) => r,
            RegressorKind::Lgb(r) => r,
            RegressorKind::XgbQuantile(r) => r,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressorKind::Xgb(r) => r,
            RegressorKind::Lgb(r) => r,
            RegressorKind::XgbQuantile(r) => r,
        }
    }
}

/// Feature importance diagnostic attached to fitted models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Normalized share of the total split gain
    pub gain: f64,
}

/// A model as it moves through the pipelines: the fitted regressor plus the
/// auxiliary state the prediction side needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadModel {
    pub model_type: ModelType,
    pub regressor: RegressorKind,
    /// Regressor input columns, recorded at fit time
    pub feature_names: Vec<String>,
    pub feature_importance: Option<Vec<FeatureImportance>>,
    /// Hour-of-day stdev table; None for the quantile family
    pub standard_deviation: Option<StandardDeviationTable>,
}

impl LoadModel {
    pub fn new(model_type: ModelType, regressor: RegressorKind) -> Self {
        Self {
            model_type,
            regressor,
            feature_names: Vec::new(),
            feature_importance: None,
            standard_deviation: None,
        }
    }

    /// Fit the underlying regressor and record the feature layout
    pub fn fit(
        &mut self,
        train: (&FeatureMatrix, &[f64]),
        eval: (&FeatureMatrix, &[f64]),
        early_stopping_rounds: usize,
    ) -> Result<()> {
        self.feature_names = train.0.feature_names.clone();
        self.regressor
            .as_regressor_mut()
            .fit(train, eval, early_stopping_rounds)
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_features(x)?;
        self.regressor.as_regressor().predict(x)
    }

    pub fn predict_quantile(&self, x: &FeatureMatrix, quantile: f64) -> Result<Vec<f64>> {
        self.check_features(x)?;
        self.regressor.as_regressor().predict_quantile(x, quantile)
    }

    pub fn score(&self, x: &FeatureMatrix, y: &[f64]) -> ScoreOutcome {
        if let Err(e) = self.check_features(x) {
            return ScoreOutcome::Incomparable(e.to_string());
        }
        self.regressor.as_regressor().score(x, y)
    }

    pub fn get_params(&self) -> Map<String, Value> {
        self.regressor.as_regressor().get_params()
    }

    pub fn set_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        self.regressor.as_regressor_mut().set_params(params)
    }

    /// Predict from a feature table using the fitted feature layout
    pub fn predict_table(&self, table: &TimeSeriesTable) -> Result<Vec<f64>> {
        let x = FeatureMatrix::from_table(table, &self.feature_names)?;
        self.predict(&x)
    }

    /// Build and attach the normalized feature importance diagnostic
    pub fn set_feature_importance(&mut self) {
        self.feature_importance = self.regressor.as_regressor().feature_importance().map(
            |gains| {
                let total: f64 = gains.iter().sum();
                self.feature_names
                    .iter()
                    .zip(gains.iter())
                    .map(|(feature, gain)| FeatureImportance {
                        feature: feature.clone(),
                        gain: if total > 0.0 { gain / total } else { 0.0 },
                    })
                    .collect()
            },
        );
    }

    fn check_features(&self, x: &FeatureMatrix) -> Result<()> {
        if self.feature_names.is_empty() {
            return Err(ForecastError::ValidationError(
                "Model has not been fitted".to_string(),
            ));
        }
        if x.feature_names != self.feature_names {
            return Err(ForecastError::DataError(format!(
                "Feature set mismatch: model was fitted on {:?}, got {:?}",
                self.feature_names, x.feature_names
            )));
        }
        Ok(())
    }
}
