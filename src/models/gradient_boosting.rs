//! Gradient-boosted tree regressors
//!
//! Two families share the boosting loop: the plain family derives split
//! candidates from feature quantiles, the histogram family from
//! equal-width bin edges.

use crate::error::{ForecastError, Result};
use crate::models::tree::{quantile_thresholds, RegressionTree, TreeParams};
use crate::models::{FeatureMatrix, Regressor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const QUANTILE_SPLIT_CANDIDATES: usize = 32;

/// Shared boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: usize,
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 4,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl BoostParams {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("n_estimators".to_string(), self.n_estimators.into());
        map.insert(
            "learning_rate".to_string(),
            serde_json::json!(self.learning_rate),
        );
        map.insert("max_depth".to_string(), self.max_depth.into());
        map.insert("min_child_weight".to_string(), self.min_child_weight.into());
        map.insert("subsample".to_string(), serde_json::json!(self.subsample));
        map.insert("random_state".to_string(), self.random_state.into());
        map
    }

    pub fn apply(&mut self, params: &Map<String, Value>) {
        if let Some(v) = params.get("n_estimators").and_then(Value::as_u64) {
            self.n_estimators = v as usize;
        }
        if let Some(v) = params.get("learning_rate").and_then(Value::as_f64) {
            self.learning_rate = v;
        }
        if let Some(v) = params.get("max_depth").and_then(Value::as_u64) {
            self.max_depth = v as usize;
        }
        if let Some(v) = params.get("min_child_weight").and_then(Value::as_u64) {
            self.min_child_weight = v as usize;
        }
        if let Some(v) = params.get("subsample").and_then(Value::as_f64) {
            self.subsample = v;
        }
        if let Some(v) = params.get("random_state").and_then(Value::as_u64) {
            self.random_state = v;
        }
    }
}

/// Fitted state of a boosted ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BoostedEnsemble {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
    pub gains: Vec<f64>,
}

impl BoostedEnsemble {
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        let mut predictions = vec![self.base_score; x.n_rows()];
        for tree in &self.trees {
            for (row, prediction) in predictions.iter_mut().enumerate() {
                *prediction += self.learning_rate * tree.predict_row(x, row);
            }
        }
        predictions
    }
}

/// Fit a squared-loss boosted ensemble with early stopping on eval RMSE
pub(crate) fn fit_boosted(
    x: &FeatureMatrix,
    y: &[f64],
    eval: (&FeatureMatrix, &[f64]),
    params: &BoostParams,
    thresholds: Vec<Vec<f64>>,
    early_stopping_rounds: usize,
) -> Result<BoostedEnsemble> {
    let rows: Vec<usize> = (0..x.n_rows()).filter(|&r| !y[r].is_nan()).collect();
    if rows.is_empty() {
        return Err(ForecastError::InsufficientData(
            "No rows with a target value to fit on".to_string(),
        ));
    }

    let base_score = rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64;
    let tree_params = TreeParams {
        max_depth: params.max_depth,
        min_samples_leaf: params.min_child_weight.max(1),
    };
    let mut rng = StdRng::seed_from_u64(params.random_state);

    let (eval_x, eval_y) = eval;
    let eval_rows: Vec<usize> = (0..eval_x.n_rows())
        .filter(|&r| !eval_y[r].is_nan())
        .collect();

    let mut gains = vec![0.0; x.n_features()];
    let mut trees: Vec<RegressionTree> = Vec::with_capacity(params.n_estimators);
    let mut train_pred = vec![base_score; x.n_rows()];
    let mut eval_pred = vec![base_score; eval_x.n_rows()];
    let mut best_rmse = f64::INFINITY;
    let mut best_round = 0;

    for round in 0..params.n_estimators {
        let residuals: Vec<f64> = (0..x.n_rows()).map(|r| y[r] - train_pred[r]).collect();

        let fit_rows = if params.subsample < 1.0 {
            let take = ((rows.len() as f64) * params.subsample).round() as usize;
            let mut sampled = rows.clone();
            sampled.shuffle(&mut rng);
            sampled.truncate(take.max(1));
            sampled
        } else {
            rows.clone()
        };

        let tree = RegressionTree::fit(x, &residuals, &fit_rows, &thresholds, &tree_params, &mut gains);

        for &r in &rows {
            train_pred[r] += params.learning_rate * tree.predict_row(x, r);
        }
        for &r in &eval_rows {
            eval_pred[r] += params.learning_rate * tree.predict_row(eval_x, r);
        }
        trees.push(tree);

        if !eval_rows.is_empty() {
            let sse: f64 = eval_rows
                .iter()
                .map(|&r| (eval_y[r] - eval_pred[r]).powi(2))
                .sum();
            let rmse = (sse / eval_rows.len() as f64).sqrt();
            if rmse < best_rmse {
                best_rmse = rmse;
                best_round = round;
            } else if early_stopping_rounds > 0 && round - best_round >= early_stopping_rounds {
                break;
            }
        }
    }

    if !eval_rows.is_empty() {
        trees.truncate(best_round + 1);
    }

    Ok(BoostedEnsemble {
        base_score,
        learning_rate: params.learning_rate,
        trees,
        gains,
    })
}

/// Gradient-boosted trees with quantile-derived split candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: BoostParams,
    ensemble: Option<BoostedEnsemble>,
}

impl GradientBoostingRegressor {
    pub fn new() -> Self {
        Self {
            params: BoostParams::default(),
            ensemble: None,
        }
    }
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(
        &mut self,
        train: (&FeatureMatrix, &[f64]),
        eval: (&FeatureMatrix, &[f64]),
        early_stopping_rounds: usize,
    ) -> Result<()> {
        let (x, y) = train;
        let thresholds: Vec<Vec<f64>> = (0..x.n_features())
            .map(|f| quantile_thresholds(x.column(f), QUANTILE_SPLIT_CANDIDATES))
            .collect();
        self.ensemble = Some(fit_boosted(
            x,
            y,
            eval,
            &self.params,
            thresholds,
            early_stopping_rounds,
        )?);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let ensemble = self.ensemble.as_ref().ok_or_else(|| {
            ForecastError::ValidationError("Model has not been fitted".to_string())
        })?;
        Ok(ensemble.predict(x))
    }

    fn get_params(&self) -> Map<String, Value> {
        self.params.to_map()
    }

    fn set_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        self.params.apply(params);
        Ok(())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.ensemble.as_ref().map(|e| e.gains.clone())
    }
}

/// Gradient-boosted trees on histogram bin edges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistGradientBoostingRegressor {
    params: BoostParams,
    max_bins: usize,
    ensemble: Option<BoostedEnsemble>,
}

impl HistGradientBoostingRegressor {
    pub fn new() -> Self {
        Self {
            params: BoostParams::default(),
            max_bins: 64,
            ensemble: None,
        }
    }
}

impl Default for HistGradientBoostingRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Equal-width bin edges over the finite value range of one feature
fn histogram_edges(values: &[f64], max_bins: usize) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return Vec::new();
    }
    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return Vec::new();
    }
    let width = (max - min) / max_bins as f64;
    (1..max_bins).map(|i| min + width * i as f64).collect()
}

impl Regressor for HistGradientBoostingRegressor {
    fn fit(
        &mut self,
        train: (&FeatureMatrix, &[f64]),
        eval: (&FeatureMatrix, &[f64]),
        early_stopping_rounds: usize,
    ) -> Result<()> {
        let (x, y) = train;
        let thresholds: Vec<Vec<f64>> = (0..x.n_features())
            .map(|f| histogram_edges(x.column(f), self.max_bins))
            .collect();
        self.ensemble = Some(fit_boosted(
            x,
            y,
            eval,
            &self.params,
            thresholds,
            early_stopping_rounds,
        )?);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let ensemble = self.ensemble.as_ref().ok_or_else(|| {
            ForecastError::ValidationError("Model has not been fitted".to_string())
        })?;
        Ok(ensemble.predict(x))
    }

    fn get_params(&self) -> Map<String, Value> {
        let mut map = self.params.to_map();
        map.insert("max_bins".to_string(), self.max_bins.into());
        map
    }

    fn set_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        self.params.apply(params);
        if let Some(v) = params.get("max_bins").and_then(Value::as_u64) {
            self.max_bins = v as usize;
        }
        Ok(())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.ensemble.as_ref().map(|e| e.gains.clone())
    }
}
