mod common;

use load_forecast::data::TimeSeriesTable;
use load_forecast::error::ForecastError;
use load_forecast::jobs::ModelSpecification;
use load_forecast::models::ModelType;
use load_forecast::pipeline::{
    train_model_pipeline, train_model_pipeline_core, TrainConfig, TrainOutcome,
};
use load_forecast::storage::FileSystemStorage;
use tempfile::TempDir;

fn no_age_check() -> TrainConfig {
    TrainConfig {
        check_old_model_age: false,
        ..TrainConfig::default()
    }
}

#[test]
fn empty_input_is_insufficient() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);

    let err = train_model_pipeline(&job, &TimeSeriesTable::empty(), &storage, &no_age_check())
        .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
}

#[test]
fn load_must_be_the_first_column() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);

    let table = common::synthetic_load_table(14);
    let load = table.load().unwrap();
    let wrong_order = TimeSeriesTable::from_columns(
        table.timestamps(),
        vec![("temperature", vec![20.0; load.len()]), ("load", load)],
    )
    .unwrap();

    let err =
        train_model_pipeline(&job, &wrong_order, &storage, &no_age_check()).unwrap_err();
    assert!(matches!(err, ForecastError::WrongColumnOrder(_)));
}

#[test]
fn too_little_history_is_insufficient() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);

    // Under a week of data
    let err = train_model_pipeline(
        &job,
        &common::synthetic_load_table(3),
        &storage,
        &no_age_check(),
    )
    .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
}

#[test]
fn retraining_on_equivalent_data_refreshes_the_model() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);

    let first = train_model_pipeline(&job, &input, &storage, &no_age_check()).unwrap();
    assert!(matches!(first, TrainOutcome::Trained(_)));

    // The stored model scores about the same as the new one, not clearly
    // better, so the new model is saved
    let second = train_model_pipeline(&job, &input, &storage, &no_age_check()).unwrap();
    assert!(matches!(second, TrainOutcome::Trained(_)));

    let job_dir = dir.path().join(job.id.to_string());
    assert_eq!(std::fs::read_dir(&job_dir).unwrap().count(), 2);
}

#[test]
fn clearly_worse_new_model_is_rejected() {
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);

    let mut first_spec = ModelSpecification::new(job.id);
    let (old_model, _, _) =
        train_model_pipeline_core(&job, &mut first_spec, &input, None, &no_age_check())
            .unwrap();

    // A single barely-learning tree stays close to the target mean and
    // cannot come near the stored model's score
    let mut weak_spec = ModelSpecification::new(job.id);
    weak_spec
        .hyper_params
        .insert("n_estimators".to_string(), 1.into());
    weak_spec
        .hyper_params
        .insert("learning_rate".to_string(), serde_json::json!(0.01));

    let (_, _, new_model_wins) = train_model_pipeline_core(
        &job,
        &mut weak_spec,
        &input,
        Some(&old_model),
        &no_age_check(),
    )
    .unwrap();
    assert!(!new_model_wins);
}

#[test]
fn penalty_factor_tightens_the_comparison() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);

    // With a margin below one, an equivalent old model counts as clearly
    // better and retraining on the same data keeps it
    let config = TrainConfig {
        check_old_model_age: false,
        penalty_factor: 0.5,
        ..TrainConfig::default()
    };

    let first = train_model_pipeline(&job, &input, &storage, &config).unwrap();
    assert!(matches!(first, TrainOutcome::Trained(_)));

    let second = train_model_pipeline(&job, &input, &storage, &config).unwrap();
    assert!(matches!(second, TrainOutcome::OldModelRetained(_)));

    let job_dir = dir.path().join(job.id.to_string());
    assert_eq!(std::fs::read_dir(&job_dir).unwrap().count(), 1);
}

#[test]
fn fresh_models_are_not_retrained() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);

    train_model_pipeline(&job, &input, &storage, &no_age_check()).unwrap();

    let outcome =
        train_model_pipeline(&job, &input, &storage, &TrainConfig::default()).unwrap();
    assert!(matches!(outcome, TrainOutcome::SkippedFreshModel));
}

#[test]
fn training_produces_a_report_with_feature_importance() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);

    let outcome = train_model_pipeline(&job, &input, &storage, &no_age_check()).unwrap();
    let report = match outcome {
        TrainOutcome::Trained(report) => report,
        other => panic!("Expected Trained, got {:?}", other),
    };

    // A strong daily pattern should be learnable
    assert!(report.validation_metrics.r2 > 0.5);
    assert!(report.train_metrics.rmse > 0.0);
    // Regular training runs carve no test holdout
    assert!(report.test_metrics.is_none());
    assert!(!report.feature_importance.is_empty());
    let total_gain: f64 = report.feature_importance.iter().map(|fi| fi.gain).sum();
    assert!((total_gain - 1.0).abs() < 1e-6);
}
