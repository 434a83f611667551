//! Experiment execution: resolve the cohort, publish the dataset and its metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use counterfactual::io::config::ExperimentConfig;
use counterfactual::io::dataset_store::write_dataset;
use counterfactual::orchestrator::run_replications;
use counterfactual::sim::HivSimulator;
use tracing::{debug, info, instrument};

use crate::results::{META_FILE, MetaInput, RunMeta, output_dir, write_meta};

/// Where a generate call persisted its outputs.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub dataset_path: PathBuf,
    pub meta: RunMeta,
}

/// A dataset or its metadata could not be written.
#[derive(Debug)]
pub struct PersistError(anyhow::Error);

impl From<anyhow::Error> for PersistError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for PersistError {}

/// Run an experiment end-to-end and write `dataset.{csv,json}` plus `meta.json`.
#[instrument(skip_all, fields(experiment_id = %experiment_id))]
pub fn run_experiment(
    data_dir: &Path,
    experiment_id: &str,
    config: &ExperimentConfig,
) -> Result<GenerateOutcome> {
    info!("experiment started");
    let plan = config.plan()?;
    let started_at = Utc::now();
    let output = run_replications(&HivSimulator, &plan, &config.cohort)?;
    debug!(
        rows = output.dataset.len(),
        failures = output.failures.len(),
        "cohort resolved"
    );

    let dir = output_dir(data_dir, experiment_id);
    let dataset_path = write_dataset(&dir, &output.dataset).map_err(PersistError::from)?;
    let finished_at = Utc::now();
    let meta = RunMeta::build(&MetaInput {
        experiment_id,
        config,
        dataset_path: &dataset_path,
        rows: output.dataset.len(),
        failures: &output.failures,
        started_at,
        finished_at,
    })?;
    write_meta(&dir.join(META_FILE), &meta)
        .context("write run metadata")
        .map_err(PersistError::from)?;

    info!(
        path = %dataset_path.display(),
        rows = meta.rows,
        failures = meta.failures.len(),
        "experiment complete"
    );
    Ok(GenerateOutcome { dataset_path, meta })
}
