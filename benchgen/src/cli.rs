//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::config::{Overrides, apply_overrides};
use crate::experiment::{ExperimentFile, discover_experiments, find_experiment, validate_experiment_id};
use crate::report::aggregate;
use crate::results::output_dir;
use crate::run::run_experiment;

pub fn experiments_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("benchgen").join("experiments")
}

pub fn data_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("data")
}

/// List all available experiments.
pub fn list_experiments(repo_root: &Path) -> Result<()> {
    for file in discover_experiments(&experiments_dir(repo_root))? {
        if file.experiment.description.is_empty() {
            println!("{}", file.experiment.id);
        } else {
            println!("{}\t{}", file.experiment.id, file.experiment.description);
        }
    }
    Ok(())
}

/// Generate datasets for one experiment, or every experiment when `id` is `None`.
pub fn generate(repo_root: &Path, id: Option<&str>, overrides: &Overrides) -> Result<()> {
    let dir = experiments_dir(repo_root);
    let experiments = match id {
        Some(id) => vec![find_experiment(&dir, id)?],
        None => discover_experiments(&dir)?,
    };
    if experiments.is_empty() {
        bail!("no experiments found in {}", dir.display());
    }
    info!(count = experiments.len(), "generating datasets");
    for file in experiments {
        generate_one(repo_root, file, overrides)?;
    }
    Ok(())
}

fn generate_one(repo_root: &Path, file: ExperimentFile, overrides: &Overrides) -> Result<()> {
    let id = file.experiment.id;
    let config = apply_overrides(file.config, overrides)
        .with_context(|| format!("apply overrides to {id}"))?;
    debug!(experiment_id = %id, seed = config.cohort.seed, "experiment loaded");
    let outcome = run_experiment(&data_dir(repo_root), &id, &config)
        .with_context(|| format!("generate {id}"))?;
    println!(
        "generate: experiment={} rows={} failures={} dataset={}",
        id,
        outcome.meta.rows,
        outcome.meta.failures.len(),
        outcome.dataset_path.display()
    );
    Ok(())
}

/// Show summary statistics of a generated dataset.
pub fn report_experiment(repo_root: &Path, id: &str) -> Result<()> {
    validate_experiment_id(id)?;
    let dir = output_dir(&data_dir(repo_root), id);
    let (summary, warnings) = aggregate(&dir).with_context(|| format!("report {id}"))?;
    println!(
        "report: experiment={} rows={} replications={}",
        id,
        summary.rows,
        summary.replications.len()
    );
    if let Some(failures) = summary.failures {
        println!("report: failures={failures}");
    }
    if let Some(ate) = summary.mean_ate() {
        println!("report: mean_ate={ate:.4}");
    }
    for replication in &summary.replications {
        let render = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
        println!(
            "report: replication={} rows={} treated_fraction={:.3} ate={:.4} naive={} bias={}",
            replication.replication,
            replication.rows,
            replication.treated_fraction(),
            replication.ate,
            render(replication.naive_difference),
            render(replication.bias())
        );
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Remove generated outputs for an experiment.
pub fn clean_experiment(repo_root: &Path, id: &str) -> Result<()> {
    validate_experiment_id(id)?;
    let dir = output_dir(&data_dir(repo_root), id);
    if dir.exists() {
        fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
    }
    println!("clean: experiment={} data={}", id, dir.display());
    Ok(())
}
