mod common;

use load_forecast::jobs::ModelSpecification;
use load_forecast::models::ModelType;
use load_forecast::pipeline::{
    basecase_pipeline_at, predict_pipeline_at, train_model_pipeline, train_model_pipeline_core,
    TrainConfig, TrainOutcome, BASECASE_HORIZON_MINUTES,
};
use load_forecast::storage::{FileSystemStorage, ModelStorage};
use polars::prelude::*;
use tempfile::TempDir;

fn no_age_check() -> TrainConfig {
    TrainConfig {
        check_old_model_age: false,
        ..TrainConfig::default()
    }
}

fn column_f64(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect()
}

#[test]
fn train_and_predict_produce_a_stamped_forecast() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(90);

    let outcome = train_model_pipeline(&job, &input, &storage, &no_age_check()).unwrap();
    assert!(matches!(outcome, TrainOutcome::Trained(_)));

    let model = storage.load_model(job.id).unwrap().model;
    let forecast =
        predict_pipeline_at(&job, &model, &input, common::forecast_time(88)).unwrap();

    // One row per step from one resolution before now to the full horizon
    let expected_rows = (job.horizon_minutes / job.resolution_minutes) as usize + 2;
    assert_eq!(forecast.height(), expected_rows);

    for name in [
        "timestamp",
        "forecast",
        "quantile_P10",
        "quantile_P50",
        "quantile_P90",
        "pid",
        "customer",
        "description",
        "type",
        "algtype",
    ] {
        assert!(
            forecast.get_column_names().contains(&name),
            "missing column {}",
            name
        );
    }
    assert!(!forecast.get_column_names().contains(&"quality"));

    let point = column_f64(&forecast, "forecast");
    assert!(point.iter().all(|v| v.is_finite()));

    let p10 = column_f64(&forecast, "quantile_P10");
    let p90 = column_f64(&forecast, "quantile_P90");
    for i in 0..forecast.height() {
        assert!(p10[i] <= p90[i]);
    }

    let pid = forecast.column("pid").unwrap().i64().unwrap().get(0).unwrap();
    assert_eq!(pid, common::TEST_PID as i64);
    let algtype = forecast.column("algtype").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(algtype, "xgb");
    let customer = forecast.column("customer").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(customer, "test_customer");
}

#[test]
fn quantile_family_predicts_each_quantile_directly() {
    let job = common::demand_job(ModelType::XgbQuantile);
    let input = common::synthetic_load_table(30);

    let mut specification = ModelSpecification::new(job.id);
    specification
        .hyper_params
        .insert("n_estimators".to_string(), 15.into());

    let (model, _, wins) =
        train_model_pipeline_core(&job, &mut specification, &input, None, &no_age_check())
            .unwrap();
    assert!(wins);
    assert_eq!(
        specification.feature_names.as_deref(),
        Some(model.feature_names.as_slice())
    );

    let forecast =
        predict_pipeline_at(&job, &model, &input, common::forecast_time(28)).unwrap();

    let p10 = column_f64(&forecast, "quantile_P10");
    let p50 = column_f64(&forecast, "quantile_P50");
    let p90 = column_f64(&forecast, "quantile_P90");
    let point = column_f64(&forecast, "forecast");

    // Ensembles are trained per quantile, so single rows may cross, but
    // the overall levels must be ordered
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    assert!(mean(&p10) < mean(&p50));
    assert!(mean(&p50) < mean(&p90));
    // the median quantile is the point forecast
    for i in 0..forecast.height() {
        assert_eq!(point[i], p50[i]);
    }
}

#[test]
fn degraded_input_falls_back_to_the_extreme_day_forecast() {
    let job = common::demand_job(ModelType::Xgb);
    let long_input = common::synthetic_load_table(30);

    let dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(dir.path());
    train_model_pipeline(&job, &long_input, &storage, &no_age_check()).unwrap();
    let model = storage.load_model(job.id).unwrap().model;

    // Three days of history is below the sufficiency threshold
    let short_input = common::synthetic_load_table(3);
    let forecast =
        predict_pipeline_at(&job, &model, &short_input, common::forecast_time(3)).unwrap();

    let algtype = forecast.column("algtype").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(algtype, "fallback");
    let quality = forecast.column("quality").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(quality, "substituted");
    assert!(column_f64(&forecast, "forecast").iter().all(|v| v.is_finite()));
}

#[test]
fn basecase_forecast_covers_the_extended_horizon() {
    let job = common::demand_job(ModelType::Xgb);
    let input = common::synthetic_load_table(30);
    let now = common::forecast_time(28);

    let forecast = basecase_pipeline_at(&job, &input, now).unwrap();

    let expected_rows =
        ((BASECASE_HORIZON_MINUTES - job.horizon_minutes as i64) / 15) as usize + 1;
    assert_eq!(forecast.height(), expected_rows);

    let forecast_type = forecast.column("type").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(forecast_type, "basecase");
    let quality = forecast.column("quality").unwrap().utf8().unwrap().get(0).unwrap();
    assert_eq!(quality, "not_renewed");

    let point = column_f64(&forecast, "forecast");
    assert!(point.iter().all(|v| v.is_finite()));
    let p10 = column_f64(&forecast, "quantile_P10");
    let p90 = column_f64(&forecast, "quantile_P90");
    for i in 0..forecast.height() {
        assert!(p10[i] < point[i] && point[i] < p90[i]);
    }
}
