//! Run metadata persisted next to each dataset.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use counterfactual::error::describe;
use counterfactual::io::atomic::write_atomic;
use counterfactual::io::config::ExperimentConfig;
use counterfactual::orchestrator::SubjectFailure;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const META_FILE: &str = "meta.json";

/// A subject excluded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub replication: u32,
    pub subject: u32,
    pub error: String,
}

impl From<&SubjectFailure> for FailureEntry {
    fn from(failure: &SubjectFailure) -> Self {
        Self {
            replication: failure.replication,
            subject: failure.subject,
            error: describe(&failure.error),
        }
    }
}

/// Metadata for a generated dataset, persisted to `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub experiment_id: String,
    /// SHA-256 of the canonical config TOML, for reproducibility tracking.
    pub config_hash: String,
    pub seed: u64,
    pub subjects: u32,
    pub replications: u32,
    pub rows: usize,
    pub dataset: String,
    pub failures: Vec<FailureEntry>,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
}

/// Timing and outcome of one generate call, before it becomes [`RunMeta`].
#[derive(Debug)]
pub struct MetaInput<'a> {
    pub experiment_id: &'a str,
    pub config: &'a ExperimentConfig,
    pub dataset_path: &'a Path,
    pub rows: usize,
    pub failures: &'a [SubjectFailure],
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunMeta {
    pub fn build(input: &MetaInput<'_>) -> Result<Self> {
        let duration = input.finished_at - input.started_at;
        let dataset = input
            .dataset_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            experiment_id: input.experiment_id.to_string(),
            config_hash: config_hash(input.config)?,
            seed: input.config.cohort.seed,
            subjects: input.config.cohort.subjects,
            replications: input.config.cohort.replications,
            rows: input.rows,
            dataset,
            failures: input.failures.iter().map(FailureEntry::from).collect(),
            start_time: input.started_at.to_rfc3339(),
            end_time: input.finished_at.to_rfc3339(),
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        })
    }
}

/// Output directory of an experiment.
pub fn output_dir(data_dir: &Path, experiment_id: &str) -> PathBuf {
    data_dir.join(experiment_id)
}

pub fn config_hash(config: &ExperimentConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(config.to_toml()?.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    write_atomic(path, format!("{contents}\n").as_bytes())
}

pub fn read_meta(path: &Path) -> Result<RunMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
