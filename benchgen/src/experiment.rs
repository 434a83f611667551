//! Experiment file parsing and validation.
//!
//! Experiments are TOML files with an `[experiment]` table plus the
//! configuration sections of [`ExperimentConfig`]. See
//! `benchgen/experiments/` for the bundled definitions.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use counterfactual::io::config::ExperimentConfig;
use serde::Deserialize;

/// A parsed experiment file: metadata plus the full configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExperimentFile {
    pub experiment: ExperimentMeta,
    #[serde(flatten)]
    pub config: ExperimentConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExperimentMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`), also the output directory name.
    pub id: String,
    #[serde(default)]
    pub description: String,
}

impl ExperimentFile {
    /// Load and validate an experiment file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read experiment {}", path.display()))?;
        Self::parse_str(&contents)
            .with_context(|| format!("load experiment {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let file: ExperimentFile = toml::from_str(contents).context("parse experiment")?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        validate_experiment_id(&self.experiment.id)?;
        self.config.validate()?;
        Ok(())
    }
}

/// Discover and load all experiment files from a directory.
///
/// Returns experiments sorted by id. Errors if duplicate ids are found.
pub fn discover_experiments(dir: &Path) -> Result<Vec<ExperimentFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut experiments = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("read experiments dir {}", dir.display()))?
    {
        let entry = entry.context("read experiment entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        experiments.push(ExperimentFile::load(&path)?);
    }
    experiments.sort_by(|left, right| left.experiment.id.cmp(&right.experiment.id));
    for pair in experiments.windows(2) {
        if pair[0].experiment.id == pair[1].experiment.id {
            return Err(anyhow!("duplicate experiment.id {}", pair[0].experiment.id));
        }
    }
    Ok(experiments)
}

/// Find one experiment by id.
pub fn find_experiment(dir: &Path, id: &str) -> Result<ExperimentFile> {
    validate_experiment_id(id)?;
    discover_experiments(dir)?
        .into_iter()
        .find(|file| file.experiment.id == id)
        .ok_or_else(|| anyhow!("experiment {id} not found in {}", dir.display()))
}

pub fn validate_experiment_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("experiment.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("experiment.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("experiment.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("experiment.id must use [a-z0-9_-] only");
    }
    Ok(())
}
