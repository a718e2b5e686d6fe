//! # Load Forecast
//!
//! Short-term electricity load forecasting: horizon-aware feature
//! engineering, gradient-boosted model training with old/new model
//! comparison, quantile and Gaussian confidence intervals, and model-free
//! fallback and basecase forecasts.
//!
//! ## Quick start
//!
//! ```no_run
//! use load_forecast::jobs::PredictionJob;
//! use load_forecast::models::ModelType;
//! use load_forecast::pipeline::{predict_pipeline, train_model_pipeline, TrainConfig};
//! use load_forecast::storage::{FileSystemStorage, ModelStorage};
//! # use load_forecast::data::DataLoader;
//!
//! # fn main() -> load_forecast::error::Result<()> {
//! let job = PredictionJob::new(307, "test_customer", ModelType::Xgb);
//! let storage = FileSystemStorage::new("./models");
//! let input = DataLoader::from_csv("load.csv")?;
//!
//! train_model_pipeline(&job, &input, &storage, &TrainConfig::default())?;
//! let model = storage.load_model(job.id)?.model;
//! let forecast = predict_pipeline(&job, &model, &input)?;
//! println!("{}", forecast);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod features;
pub mod jobs;
pub mod metrics;
pub mod model_selection;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod validation;

pub use data::{DataLoader, TimeSeriesTable};
pub use error::{ForecastError, Result};
pub use jobs::{ModelSpecification, PredictionJob};
pub use models::{LoadModel, ModelCreator, ModelType};
pub use storage::{FileSystemStorage, ModelStorage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
