//! Regression tree used as the base learner of the boosted ensembles
//!
//! Splits are evaluated on a fixed per-feature candidate threshold grid
//! supplied by the ensemble (raw quantiles for the plain family, histogram
//! bin edges for the histogram family). Rows with a missing feature value
//! are routed to the left child.

use crate::models::FeatureMatrix;
use serde::{Deserialize, Serialize};

const LEAF: usize = usize::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    feature: usize,
    threshold: f64,
    left: usize,
    right: usize,
    value: f64,
}

/// Parameters of a single tree fit
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Fit a tree on the given rows. Split gains are accumulated into
    /// `gains`, one slot per feature.
    pub fn fit(
        x: &FeatureMatrix,
        targets: &[f64],
        rows: &[usize],
        thresholds: &[Vec<f64>],
        params: &TreeParams,
        gains: &mut [f64],
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, targets, rows.to_vec(), 0, thresholds, params, gains);
        tree
    }

    fn build(
        &mut self,
        x: &FeatureMatrix,
        targets: &[f64],
        rows: Vec<usize>,
        depth: usize,
        thresholds: &[Vec<f64>],
        params: &TreeParams,
        gains: &mut [f64],
    ) -> usize {
        let n = rows.len();
        let sum: f64 = rows.iter().map(|&r| targets[r]).sum();
        let value = if n > 0 { sum / n as f64 } else { 0.0 };

        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            feature: 0,
            threshold: 0.0,
            left: LEAF,
            right: LEAF,
            value,
        });

        if depth >= params.max_depth || n < 2 * params.min_samples_leaf {
            return index;
        }

        let split = match best_split(x, targets, &rows, thresholds, params, sum) {
            Some(split) => split,
            None => return index,
        };
        gains[split.feature] += split.gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| {
            let v = x.value(r, split.feature);
            v.is_nan() || v <= split.threshold
        });

        let left = self.build(x, targets, left_rows, depth + 1, thresholds, params, gains);
        let right = self.build(x, targets, right_rows, depth + 1, thresholds, params, gains);
        self.nodes[index].feature = split.feature;
        self.nodes[index].threshold = split.threshold;
        self.nodes[index].left = left;
        self.nodes[index].right = right;
        index
    }

    /// Predict a single row
    pub fn predict_row(&self, x: &FeatureMatrix, row: usize) -> f64 {
        self.nodes[self.leaf_for_row(x, row)].value
    }

    /// Index of the leaf node a row falls into
    pub fn leaf_for_row(&self, x: &FeatureMatrix, row: usize) -> usize {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.left == LEAF {
                return index;
            }
            let v = x.value(row, node.feature);
            index = if v.is_nan() || v <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    /// Overwrite a leaf value; used by the quantile ensemble to re-estimate
    /// leaves as residual quantiles after the structure is fitted
    pub fn set_leaf_value(&mut self, leaf: usize, value: f64) {
        self.nodes[leaf].value = value;
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Pick the split maximizing the reduction of squared error, computed via
/// per-bucket prefix sums over the candidate threshold grid.
fn best_split(
    x: &FeatureMatrix,
    targets: &[f64],
    rows: &[usize],
    thresholds: &[Vec<f64>],
    params: &TreeParams,
    total_sum: f64,
) -> Option<Split> {
    let n = rows.len();
    let parent_score = total_sum * total_sum / n as f64;
    let mut best: Option<Split> = None;

    for feature in 0..x.n_features() {
        let candidates = &thresholds[feature];
        if candidates.is_empty() {
            continue;
        }

        // bucket b holds rows with candidates[b-1] < v <= candidates[b];
        // missing values get their own bucket that always goes left
        let n_buckets = candidates.len() + 1;
        let mut counts = vec![0usize; n_buckets];
        let mut sums = vec![0.0f64; n_buckets];
        let mut nan_count = 0usize;
        let mut nan_sum = 0.0f64;

        for &r in rows {
            let v = x.value(r, feature);
            if v.is_nan() {
                nan_count += 1;
                nan_sum += targets[r];
            } else {
                let bucket = candidates.partition_point(|&t| t < v);
                counts[bucket] += 1;
                sums[bucket] += targets[r];
            }
        }

        let mut left_count = nan_count;
        let mut left_sum = nan_sum;
        for (j, &threshold) in candidates.iter().enumerate() {
            left_count += counts[j];
            left_sum += sums[j];
            let right_count = n - left_count;
            if left_count < params.min_samples_leaf || right_count < params.min_samples_leaf {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let score = left_sum * left_sum / left_count as f64
                + right_sum * right_sum / right_count as f64;
            let gain = score - parent_score;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }

    best
}

/// Candidate thresholds for one feature: up to `max_candidates` quantile
/// points of the non-missing values.
pub fn quantile_thresholds(values: &[f64], max_candidates: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.len() < 2 {
        return Vec::new();
    }

    let mut thresholds = Vec::with_capacity(max_candidates);
    for i in 1..=max_candidates {
        let pos = i * (sorted.len() - 1) / (max_candidates + 1);
        thresholds.push(sorted[pos]);
    }
    thresholds.dedup();
    // splitting at the maximum would produce an empty right child
    let max = *sorted.last().unwrap();
    thresholds.retain(|&t| t < max);
    thresholds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSeriesTable;
    use crate::models::FeatureMatrix;
    use chrono::{Duration, TimeZone, Utc};

    fn matrix(values: Vec<f64>) -> FeatureMatrix {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let stamps: Vec<_> = (0..values.len())
            .map(|i| start + Duration::minutes(15 * i as i64))
            .collect();
        let table = TimeSeriesTable::from_columns(stamps, vec![("x", values)]).unwrap();
        FeatureMatrix::from_table(&table, &["x".to_string()]).unwrap()
    }

    #[test]
    fn fits_a_step_function() {
        let x = matrix((0..100).map(|i| i as f64).collect());
        let targets: Vec<f64> = (0..100).map(|i| if i < 50 { 1.0 } else { 5.0 }).collect();
        let rows: Vec<usize> = (0..100).collect();
        let thresholds = vec![quantile_thresholds(x.column(0), 16)];
        let mut gains = vec![0.0];

        let tree = RegressionTree::fit(
            &x,
            &targets,
            &rows,
            &thresholds,
            &TreeParams {
                max_depth: 2,
                min_samples_leaf: 1,
            },
            &mut gains,
        );

        assert!((tree.predict_row(&x, 10) - 1.0).abs() < 0.5);
        assert!((tree.predict_row(&x, 90) - 5.0).abs() < 0.5);
        assert!(gains[0] > 0.0);
    }

    #[test]
    fn missing_values_go_left() {
        let mut values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        values[3] = f64::NAN;
        let x = matrix(values);
        let targets: Vec<f64> = (0..100).map(|i| if i < 50 { 0.0 } else { 10.0 }).collect();
        let rows: Vec<usize> = (0..100).collect();
        let thresholds = vec![quantile_thresholds(x.column(0), 16)];
        let mut gains = vec![0.0];

        let tree = RegressionTree::fit(
            &x,
            &targets,
            &rows,
            &thresholds,
            &TreeParams {
                max_depth: 1,
                min_samples_leaf: 1,
            },
            &mut gains,
        );

        // The NaN row follows the left branch and gets the low prediction
        assert!(tree.predict_row(&x, 3) < 5.0);
    }
}
