//! Training reports
//!
//! A report captures the quality of a freshly trained model on the train,
//! validation and test splits, plus the model's feature importance. It is
//! stored next to the model artifact for later inspection.

use crate::data::TimeSeriesTable;
use crate::error::Result;
use crate::metrics;
use crate::models::{FeatureImportance, FeatureMatrix, LoadModel};
use serde::{Deserialize, Serialize};

/// Point-forecast quality metrics for one data split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSet {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub train_metrics: MetricSet,
    pub validation_metrics: MetricSet,
    /// Absent when training ran without a holdout test split
    pub test_metrics: Option<MetricSet>,
    pub feature_importance: Vec<FeatureImportance>,
}

/// Builds a [`Report`] from a fitted model and the split data sets
#[derive(Debug)]
pub struct Reporter<'a> {
    train: &'a TimeSeriesTable,
    validation: &'a TimeSeriesTable,
    test: &'a TimeSeriesTable,
}

impl<'a> Reporter<'a> {
    pub fn new(
        train: &'a TimeSeriesTable,
        validation: &'a TimeSeriesTable,
        test: &'a TimeSeriesTable,
    ) -> Self {
        Self {
            train,
            validation,
            test,
        }
    }

    pub fn generate_report(&self, model: &LoadModel) -> Result<Report> {
        let test_metrics = if self.test.is_empty() {
            None
        } else {
            Some(split_metrics(model, self.test)?)
        };

        Ok(Report {
            train_metrics: split_metrics(model, self.train)?,
            validation_metrics: split_metrics(model, self.validation)?,
            test_metrics,
            feature_importance: model.feature_importance.clone().unwrap_or_default(),
        })
    }
}

fn split_metrics(model: &LoadModel, data: &TimeSeriesTable) -> Result<MetricSet> {
    let x = FeatureMatrix::from_table(data, &model.feature_names)?;
    let predicted = model.predict(&x)?;
    let actual = data.load()?;

    Ok(MetricSet {
        mae: metrics::mean_absolute_error(&predicted, &actual)?,
        rmse: metrics::root_mean_squared_error(&predicted, &actual)?,
        r2: metrics::r_squared(&predicted, &actual)?,
    })
}
