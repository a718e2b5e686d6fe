//! Quantile gradient boosting
//!
//! One boosted ensemble per requested quantile, fitted on the pinball-loss
//! pseudo-residuals with leaves re-estimated as residual quantiles. The
//! median ensemble doubles as the point forecast.

use crate::error::{ForecastError, Result};
use crate::models::gradient_boosting::{BoostParams, BoostedEnsemble};
use crate::models::tree::{quantile_thresholds, RegressionTree, TreeParams};
use crate::models::{FeatureMatrix, Regressor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

const QUANTILE_SPLIT_CANDIDATES: usize = 32;

/// Gradient-boosted trees with native per-quantile output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileGradientBoostingRegressor {
    quantiles: Vec<f64>,
    params: BoostParams,
    ensembles: Vec<(f64, BoostedEnsemble)>,
}

impl QuantileGradientBoostingRegressor {
    pub fn new(quantiles: Vec<f64>) -> Self {
        Self {
            quantiles,
            params: BoostParams::default(),
            ensembles: Vec::new(),
        }
    }

    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    fn ensemble_for(&self, quantile: f64) -> Result<&BoostedEnsemble> {
        self.ensembles
            .iter()
            .find(|(q, _)| (q - quantile).abs() < 1e-9)
            .map(|(_, e)| e)
            .ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Quantile {} was not trained; available quantiles: {:?}",
                    quantile, self.quantiles
                ))
            })
    }

    /// The ensemble closest to the median, used for point predictions
    fn median_ensemble(&self) -> Result<&BoostedEnsemble> {
        self.ensembles
            .iter()
            .min_by(|(a, _), (b, _)| {
                (a - 0.5).abs().partial_cmp(&(b - 0.5).abs()).unwrap()
            })
            .map(|(_, e)| e)
            .ok_or_else(|| {
                ForecastError::ValidationError("Model has not been fitted".to_string())
            })
    }
}

impl Regressor for QuantileGradientBoostingRegressor {
    fn fit(
        &mut self,
        train: (&FeatureMatrix, &[f64]),
        eval: (&FeatureMatrix, &[f64]),
        early_stopping_rounds: usize,
    ) -> Result<()> {
        if self.quantiles.is_empty() {
            return Err(ForecastError::ValidationError(
                "Quantile model requires at least one quantile".to_string(),
            ));
        }
        let (x, y) = train;
        let thresholds: Vec<Vec<f64>> = (0..x.n_features())
            .map(|f| quantile_thresholds(x.column(f), QUANTILE_SPLIT_CANDIDATES))
            .collect();

        self.ensembles.clear();
        for &quantile in &self.quantiles.clone() {
            let ensemble = fit_quantile_ensemble(
                x,
                y,
                eval,
                quantile,
                &self.params,
                &thresholds,
                early_stopping_rounds,
            )?;
            self.ensembles.push((quantile, ensemble));
        }
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(self.median_ensemble()?.predict(x))
    }

    fn predict_quantile(&self, x: &FeatureMatrix, quantile: f64) -> Result<Vec<f64>> {
        Ok(self.ensemble_for(quantile)?.predict(x))
    }

    fn get_params(&self) -> Map<String, Value> {
        let mut map = self.params.to_map();
        map.insert("quantiles".to_string(), serde_json::json!(self.quantiles));
        map
    }

    fn set_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        self.params.apply(params);
        if let Some(values) = params.get("quantiles").and_then(Value::as_array) {
            let quantiles: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            for &q in &quantiles {
                if !(0.0..=1.0).contains(&q) {
                    return Err(ForecastError::ValidationError(format!(
                        "Quantile {} is outside [0, 1]",
                        q
                    )));
                }
            }
            self.quantiles = quantiles;
        }
        Ok(())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.median_ensemble().ok().map(|e| e.gains.clone())
    }
}

fn fit_quantile_ensemble(
    x: &FeatureMatrix,
    y: &[f64],
    eval: (&FeatureMatrix, &[f64]),
    quantile: f64,
    params: &BoostParams,
    thresholds: &[Vec<f64>],
    early_stopping_rounds: usize,
) -> Result<BoostedEnsemble> {
    let rows: Vec<usize> = (0..x.n_rows()).filter(|&r| !y[r].is_nan()).collect();
    if rows.is_empty() {
        return Err(ForecastError::InsufficientData(
            "No rows with a target value to fit on".to_string(),
        ));
    }

    let mut targets: Vec<f64> = rows.iter().map(|&r| y[r]).collect();
    targets.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let base_score = empirical_quantile(&targets, quantile);

    let tree_params = TreeParams {
        max_depth: params.max_depth,
        min_samples_leaf: params.min_child_weight.max(1),
    };
    let (eval_x, eval_y) = eval;
    let eval_rows: Vec<usize> = (0..eval_x.n_rows())
        .filter(|&r| !eval_y[r].is_nan())
        .collect();

    let mut gains = vec![0.0; x.n_features()];
    let mut trees = Vec::with_capacity(params.n_estimators);
    let mut train_pred = vec![base_score; x.n_rows()];
    let mut eval_pred = vec![base_score; eval_x.n_rows()];
    let mut best_loss = f64::INFINITY;
    let mut best_round = 0;

    for round in 0..params.n_estimators {
        // Pinball pseudo-residuals decide the tree structure
        let pseudo: Vec<f64> = (0..x.n_rows())
            .map(|r| {
                if y[r] > train_pred[r] {
                    quantile
                } else {
                    quantile - 1.0
                }
            })
            .collect();

        let mut tree = RegressionTree::fit(x, &pseudo, &rows, thresholds, &tree_params, &mut gains);

        // Re-estimate each leaf as the requested quantile of its residuals
        let mut leaf_residuals: HashMap<usize, Vec<f64>> = HashMap::new();
        for &r in &rows {
            leaf_residuals
                .entry(tree.leaf_for_row(x, r))
                .or_default()
                .push(y[r] - train_pred[r]);
        }
        for (leaf, mut residuals) in leaf_residuals {
            residuals.sort_by(|a, b| a.partial_cmp(b).unwrap());
            tree.set_leaf_value(leaf, empirical_quantile(&residuals, quantile));
        }

        for &r in &rows {
            train_pred[r] += params.learning_rate * tree.predict_row(x, r);
        }
        for &r in &eval_rows {
            eval_pred[r] += params.learning_rate * tree.predict_row(eval_x, r);
        }
        trees.push(tree);

        if !eval_rows.is_empty() {
            let loss: f64 = eval_rows
                .iter()
                .map(|&r| pinball_loss(eval_y[r], eval_pred[r], quantile))
                .sum::<f64>()
                / eval_rows.len() as f64;
            if loss < best_loss {
                best_loss = loss;
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

fn pinball_loss(actual: f64, predicted: f64, quantile: f64) -> f64 {
    let diff = actual - predicted;
    if diff >= 0.0 {
        quantile * diff
    } else {
        (quantile - 1.0) * -diff
    }
}

/// Quantile of an ascending-sorted slice
fn empirical_quantile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = quantile * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    let fraction = position - low as f64;
    sorted[low] + (sorted[high] - sorted[low]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empirical_quantile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(empirical_quantile(&values, 0.0), 1.0);
        assert_eq!(empirical_quantile(&values, 0.5), 3.0);
        assert_eq!(empirical_quantile(&values, 1.0), 5.0);
        assert_eq!(empirical_quantile(&values, 0.25), 2.0);
    }

    #[test]
    fn pinball_loss_penalizes_the_right_side() {
        // for q = 0.9 an under-prediction costs more than an over-prediction
        assert!(pinball_loss(10.0, 8.0, 0.9) > pinball_loss(10.0, 12.0, 0.9));
    }
}
