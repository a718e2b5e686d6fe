//! End-to-end forecasting pipelines
//!
//! The train pipeline turns validated input data into a stored model, the
//! predict pipeline turns a stored model into a stamped forecast, and the
//! basecase pipeline produces a model-free forecast for lead times beyond
//! the regular horizon.

pub mod basecase;
pub mod predict;
pub mod train;

pub use basecase::{
    basecase_pipeline, basecase_pipeline_at, BASECASE_HORIZON_MINUTES,
    BASECASE_RESOLUTION_MINUTES,
};
pub use predict::{
    add_prediction_job_properties_to_forecast, generate_forecast_datetime_range,
    predict_pipeline, predict_pipeline_at,
};
pub use train::{
    train_model_pipeline, train_model_pipeline_core, train_pipeline_common, TrainConfig,
    TrainOutcome, DEFAULT_TRAIN_HORIZONS, MAXIMUM_MODEL_AGE_DAYS, PENALTY_FACTOR_OLD_MODEL,
};
