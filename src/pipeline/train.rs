//! Model training pipeline
//!
//! Trains a model for a prediction job, compares it against the previously
//! stored model and persists it when it wins the comparison. The new model
//! replaces the stored one unless the stored one scores clearly better,
//! so retraining on equivalent data refreshes the artifact.

use crate::data::{TimeSeriesTable, HORIZON_COLUMN, LOAD_COLUMN};
use crate::error::{ForecastError, Result};
use crate::features::TrainFeatureApplicator;
use crate::jobs::{ModelSpecification, PredictionJob};
use crate::model_selection::{split_data_train_validation_test, SplitDataSets, SplitParams};
use crate::models::{FeatureMatrix, LoadModel, ModelCreator, ScoreOutcome};
use crate::models::standard_deviation::StandardDeviationGenerator;
use crate::report::{Report, Reporter};
use crate::storage::ModelStorage;
use crate::validation;
use log::{info, warn};
use serde_json::Map;

/// Margin the old model needs during comparison: it is retained only when
/// `old_score > new_score * penalty_factor`
pub const PENALTY_FACTOR_OLD_MODEL: f64 = 1.2;

/// Models younger than this are not retrained
pub const MAXIMUM_MODEL_AGE_DAYS: f64 = 7.0;

/// Default training horizons in hours: one near-term and one at the far
/// end of the 48 hour forecast window
pub const DEFAULT_TRAIN_HORIZONS: [f64; 2] = [0.25, 47.0];

const DEFAULT_EARLY_STOPPING_ROUNDS: usize = 10;
const DEFAULT_MAX_N_MODELS: usize = 10;

/// Settings of one training run
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Horizons (hours) the model is trained for
    pub horizons: Vec<f64>,
    pub early_stopping_rounds: usize,
    /// Skip training while the stored model is younger than this
    pub max_model_age_days: f64,
    /// Margin the old model needs over the new one to be retained
    pub penalty_factor: f64,
    /// When unset, a fresh stored model does not prevent retraining
    pub check_old_model_age: bool,
    /// Number of stored model artifacts kept per job
    pub max_n_models: usize,
    pub split: SplitParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            horizons: DEFAULT_TRAIN_HORIZONS.to_vec(),
            early_stopping_rounds: DEFAULT_EARLY_STOPPING_ROUNDS,
            max_model_age_days: MAXIMUM_MODEL_AGE_DAYS,
            penalty_factor: PENALTY_FACTOR_OLD_MODEL,
            check_old_model_age: true,
            max_n_models: DEFAULT_MAX_N_MODELS,
            // No test holdout during regular training runs; carving a test
            // slice is the backtesting caller's decision
            split: SplitParams {
                test_fraction: 0.0,
                ..SplitParams::default()
            },
        }
    }
}

/// Outcome of a full training run
#[derive(Debug)]
pub enum TrainOutcome {
    /// A new model was trained, saved and reported on
    Trained(Report),
    /// The old model outperformed the new one; nothing was saved
    OldModelRetained(Report),
    /// The stored model is too fresh to retrain
    SkippedFreshModel,
}

/// Train, compare against the stored model, and persist on a win.
pub fn train_model_pipeline<S: ModelStorage>(
    job: &PredictionJob,
    input_data: &TimeSeriesTable,
    storage: &S,
    config: &TrainConfig,
) -> Result<TrainOutcome> {
    if config.check_old_model_age {
        let age_days = storage.determine_model_age(job.id);
        if age_days < config.max_model_age_days {
            info!(
                "Stored model for pid {} is {:.1} days old, skipping training",
                job.id, age_days
            );
            return Ok(TrainOutcome::SkippedFreshModel);
        }
    }

    let (old_model, mut specification) = match storage.load_model(job.id) {
        Ok(stored) => (Some(stored.model), stored.specification),
        Err(ForecastError::ModelNotFound(_)) => (None, ModelSpecification::new(job.id)),
        Err(e) => return Err(e),
    };

    let (model, report, new_model_wins) = train_model_pipeline_core(
        job,
        &mut specification,
        input_data,
        old_model.as_ref(),
        config,
    )?;

    if !new_model_wins {
        warn!(
            "Old model for pid {} is better than the newly trained model, keeping it",
            job.id
        );
        return Ok(TrainOutcome::OldModelRetained(report));
    }

    storage.save_model(&model, job, &specification, &report)?;
    storage.remove_old_models(job, config.max_n_models)?;
    Ok(TrainOutcome::Trained(report))
}

/// Train a model and decide whether it beats the old one.
///
/// Fills `specification.feature_names` with the fitted feature layout.
/// The returned flag is true when the new model should replace the old one.
pub fn train_model_pipeline_core(
    job: &PredictionJob,
    specification: &mut ModelSpecification,
    input_data: &TimeSeriesTable,
    old_model: Option<&LoadModel>,
    config: &TrainConfig,
) -> Result<(LoadModel, Report, bool)> {
    let (model, report, data_sets) =
        train_pipeline_common(job, specification, input_data, config)?;
    specification.feature_names = Some(model.feature_names.clone());

    let new_model_wins = match old_model {
        None => true,
        Some(old) => {
            // Both models are scored on everything that was available at
            // training time, not just the validation slice
            let combined = data_sets.train.vstack(&data_sets.validation)?;
            let x = FeatureMatrix::from_table(&combined, &model.feature_names)?;
            let y = combined.load()?;

            let new_score = match model.score(&x, &y) {
                ScoreOutcome::Score(score) => score,
                ScoreOutcome::Incomparable(reason) => {
                    return Err(ForecastError::ValidationError(format!(
                        "Newly trained model cannot be scored: {}",
                        reason
                    )))
                }
            };

            match old.score(&x, &y) {
                // The old model is retained only when it is clearly better
                ScoreOutcome::Score(old_score) => {
                    old_score <= new_score * config.penalty_factor
                }
                ScoreOutcome::Incomparable(reason) => {
                    info!("Old model is incomparable ({}), replacing it", reason);
                    true
                }
            }
        }
    };

    Ok((model, report, new_model_wins))
}

/// Shared training steps: validate, derive features, split, fit, report.
pub fn train_pipeline_common(
    job: &PredictionJob,
    specification: &ModelSpecification,
    input_data: &TimeSeriesTable,
    config: &TrainConfig,
) -> Result<(LoadModel, Report, SplitDataSets)> {
    if input_data.is_empty() {
        return Err(ForecastError::InsufficientData(
            "Input dataframe is empty".to_string(),
        ));
    }
    if input_data.data_column_names().first().map(String::as_str) != Some(LOAD_COLUMN) {
        return Err(ForecastError::WrongColumnOrder(format!(
            "Load column should be first, found columns {:?}",
            input_data.data_column_names()
        )));
    }

    let validated = validation::validate(job.id, input_data)?;
    let cleaned = validation::clean(&validated)?;
    if !validation::is_data_sufficient(&cleaned) {
        return Err(ForecastError::InsufficientData(format!(
            "Input data is insufficient for pid {} after validation and cleaning",
            job.id
        )));
    }

    let applicator = TrainFeatureApplicator::new(
        config.horizons.clone(),
        specification.feature_names.clone(),
    );
    let features = applicator.add_features(&cleaned)?;
    check_feature_table_layout(&features)?;

    let data_sets = split_data_train_validation_test(&features, &config.split)?;
    check_feature_table_layout(&data_sets.train)?;
    check_feature_table_layout(&data_sets.validation)?;

    let mut model = build_model(job, specification)?;

    let regressor_columns = FeatureMatrix::regressor_columns(&data_sets.train);
    let x_train = FeatureMatrix::from_table(&data_sets.train, &regressor_columns)?;
    let y_train = data_sets.train.load()?;
    let x_validation = FeatureMatrix::from_table(&data_sets.validation, &regressor_columns)?;
    let y_validation = data_sets.validation.load()?;

    model.fit(
        (&x_train, &y_train),
        (&x_validation, &y_validation),
        config.early_stopping_rounds,
    )?;
    model.set_feature_importance();

    if !model.model_type.supports_quantile_output() {
        StandardDeviationGenerator::new(&data_sets.validation)
            .generate_standard_deviation_data(&mut model)?;
    }

    let report = Reporter::new(&data_sets.train, &data_sets.validation, &data_sets.test)
        .generate_report(&model)?;
    Ok((model, report, data_sets))
}

/// Construct the unfitted model for a job, seeding the quantile family with
/// the job's quantiles when the hyperparameter bag does not set them.
fn build_model(job: &PredictionJob, specification: &ModelSpecification) -> Result<LoadModel> {
    let mut kwargs: Map<String, serde_json::Value> = specification.hyper_params.clone();
    if job.model.supports_quantile_output() && !kwargs.contains_key("quantiles") {
        kwargs.insert(
            "quantiles".to_string(),
            serde_json::json!(job.quantiles.clone()),
        );
    }
    ModelCreator::create_model(job.model, &kwargs)
}

/// Training tables must keep the load column first and the horizon column
/// last; the feature applicator and the splitter both preserve this.
fn check_feature_table_layout(table: &TimeSeriesTable) -> Result<()> {
    let names = table.data_column_names();
    if names.first().map(String::as_str) != Some(LOAD_COLUMN)
        || names.last().map(String::as_str) != Some(HORIZON_COLUMN)
    {
        return Err(ForecastError::WrongColumnOrder(format!(
            "Expected '{}' first and '{}' last, found columns {:?}",
            LOAD_COLUMN, HORIZON_COLUMN, names
        )));
    }
    Ok(())
}
