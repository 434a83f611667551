//! Experiment configuration merging.
//!
//! Applies command-line overrides to an experiment's configuration.

use anyhow::Result;
use counterfactual::io::config::ExperimentConfig;

/// Cohort overrides accepted by `generate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub subjects: Option<u32>,
    pub replications: Option<u32>,
    pub workers: Option<usize>,
}

/// Apply overrides to the experiment config and re-validate.
pub fn apply_overrides(mut base: ExperimentConfig, overrides: &Overrides) -> Result<ExperimentConfig> {
    if let Some(seed) = overrides.seed {
        base.cohort.seed = seed;
    }
    if let Some(subjects) = overrides.subjects {
        base.cohort.subjects = subjects;
    }
    if let Some(replications) = overrides.replications {
        base.cohort.replications = replications;
    }
    if let Some(workers) = overrides.workers {
        base.cohort.workers = workers;
    }
    base.validate()?;
    Ok(base)
}
