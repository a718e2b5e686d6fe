//! Persistent storage of trained models
//!
//! Models, specifications and reports are stored as JSON artifacts in a
//! timestamped directory per prediction job. Deletion by the retention
//! policy is eventually consistent with concurrent readers: a reader may
//! still load a model that is about to be pruned.

use crate::error::{ForecastError, Result};
use crate::jobs::{ModelSpecification, PredictionJob};
use crate::models::LoadModel;
use crate::report::Report;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";
const MODEL_FILE: &str = "model.json";
const SPECIFICATION_FILE: &str = "specification.json";
const REPORT_FILE: &str = "report.json";

/// A model loaded from storage together with its specification and age
#[derive(Debug)]
pub struct StoredModel {
    pub model: LoadModel,
    pub specification: ModelSpecification,
    /// Age of the artifact in days; infinite when unknown
    pub age_days: f64,
}

/// Storage collaborator interface consumed by the pipelines
pub trait ModelStorage {
    /// Load the most recent model for a job; fails with `ModelNotFound`
    /// when no artifact exists.
    fn load_model(&self, pid: u32) -> Result<StoredModel>;

    /// Persist a freshly trained model with its specification and report
    fn save_model(
        &self,
        model: &LoadModel,
        job: &PredictionJob,
        specification: &ModelSpecification,
        report: &Report,
    ) -> Result<()>;

    /// Keep the `max_n_models` most recent artifacts for a job, delete the rest
    fn remove_old_models(&self, job: &PredictionJob, max_n_models: usize) -> Result<()>;

    /// Age in days of the most recent model, infinite when none exists
    fn determine_model_age(&self, pid: u32) -> f64 {
        self.load_model(pid)
            .map(|stored| stored.age_days)
            .unwrap_or(f64::INFINITY)
    }
}

/// Filesystem-backed model storage
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn job_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Artifact directories for a job, most recent first
    fn artifact_dirs(&self, pid: u32) -> Result<Vec<(DateTime<Utc>, PathBuf)>> {
        let job_dir = self.job_dir(pid);
        if !job_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&job_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Ok(naive) = NaiveDateTime::parse_from_str(&name, TIMESTAMP_FORMAT) {
                let stamp = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
                dirs.push((stamp, entry.path()));
            }
        }
        dirs.sort_by_key(|(stamp, _)| std::cmp::Reverse(*stamp));
        Ok(dirs)
    }
}

impl ModelStorage for FileSystemStorage {
    fn load_model(&self, pid: u32) -> Result<StoredModel> {
        let dirs = self.artifact_dirs(pid)?;
        let (stamp, dir) = dirs
            .into_iter()
            .next()
            .ok_or(ForecastError::ModelNotFound(pid))?;

        let model: LoadModel = read_json(&dir.join(MODEL_FILE))?;
        let specification: ModelSpecification = read_json(&dir.join(SPECIFICATION_FILE))?;
        let age = Utc::now() - stamp;
        let age_days = age.num_seconds() as f64 / 86_400.0;

        Ok(StoredModel {
            model,
            specification,
            age_days: age_days.max(0.0),
        })
    }

    fn save_model(
        &self,
        model: &LoadModel,
        job: &PredictionJob,
        specification: &ModelSpecification,
        report: &Report,
    ) -> Result<()> {
        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let dir = self.job_dir(job.id).join(&stamp);
        fs::create_dir_all(&dir)?;

        write_json(&dir.join(MODEL_FILE), model)?;
        write_json(&dir.join(SPECIFICATION_FILE), specification)?;
        write_json(&dir.join(REPORT_FILE), report)?;
        info!("Saved model for pid {} at {}", job.id, dir.display());
        Ok(())
    }

    fn remove_old_models(&self, job: &PredictionJob, max_n_models: usize) -> Result<()> {
        let dirs = self.artifact_dirs(job.id)?;
        for (_, dir) in dirs.into_iter().skip(max_n_models) {
            info!("Removing old model artifact {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string(value)?;
    fs::write(path, content)?;
    Ok(())
}
