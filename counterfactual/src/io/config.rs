//! Experiment configuration stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::extract::{CovariateSpec, OutcomeSpec};
use crate::core::plan::ExperimentPlan;
use crate::core::policy::PolicyConfig;
use crate::core::sampler::SamplerConfig;
use crate::core::types::Intervention;
use crate::error::ConfigError;
use crate::io::atomic::write_atomic;
use crate::orchestrator::CohortConfig;
use crate::sim::SimulationConfig;
use crate::sim::hiv::check_efficacy;

/// Complete configuration of one experiment (TOML).
///
/// Constructed once, validated, then shared read-only by the sampler, the
/// policy and the orchestrator. Missing fields default to the reference HIV
/// experiment: 500 subjects, 150 days, treatment on day 100, full compliance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub cohort: CohortConfig,
    pub simulation: SimulationConfig,
    pub intervention: Intervention,
    pub sampler: SamplerConfig,
    pub policy: PolicyConfig,
    pub outcome: OutcomeSpec,
    pub covariates: CovariateSpec,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cohort.validate()?;
        self.simulation.validate()?;
        let horizon = self.simulation.horizon;
        if self.intervention.time >= horizon {
            return Err(ConfigError::new(
                "intervention.time",
                format!("{} must be < horizon {horizon}", self.intervention.time),
            ));
        }
        check_efficacy("intervention.efficacy", self.intervention.efficacy)?;
        self.sampler.validate()?;
        self.policy.validate()?;
        self.outcome.validate(horizon)?;
        self.covariates.validate()?;
        Ok(())
    }

    /// Validate and build the immutable plan shared by all workers.
    pub fn plan(&self) -> Result<ExperimentPlan, ConfigError> {
        self.validate()?;
        Ok(ExperimentPlan {
            sampler: self.sampler,
            simulation: self.simulation,
            intervention: self.intervention,
            policy: self.policy.policy(),
            outcome: self.outcome,
            covariates: self.covariates.clone(),
        })
    }

    /// Canonical TOML rendering, used for hashing and persistence.
    pub fn to_toml(&self) -> Result<String> {
        let mut buf = toml::to_string_pretty(self).context("serialize config toml")?;
        buf.push('\n');
        Ok(buf)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ExperimentConfig::default()`.
pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    if !path.exists() {
        let cfg = ExperimentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExperimentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExperimentConfig) -> Result<()> {
    cfg.validate()?;
    write_atomic(path, cfg.to_toml()?.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{Compliance, PropensityPolicy};
    use crate::core::types::Biomarker;
    use crate::orchestrator::FailurePolicy;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ExperimentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = ExperimentConfig::default();
        cfg.policy.compliance = Compliance::Partial;
        cfg.policy.confounding = true;
        cfg.outcome.time = Some(120);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn defaults_match_reference_experiment() {
        let cfg = ExperimentConfig::default();
        assert_eq!(cfg.cohort.subjects, 500);
        assert_eq!(cfg.cohort.seed, 123);
        assert_eq!(cfg.cohort.failure_policy, FailurePolicy::Abort);
        assert_eq!(cfg.simulation.horizon, 150);
        assert_eq!(cfg.simulation.params.epsilon_1, 0.1);
        assert_eq!(cfg.intervention.time, 100);
        assert_eq!(cfg.intervention.efficacy, 0.5);
        assert_eq!(cfg.sampler.enrollment_prob, 0.5);
        assert_eq!(cfg.outcome.biomarker, Biomarker::InfectedT2);
        assert_eq!(cfg.covariates.biomarkers.len(), 6);
        let plan = cfg.plan().expect("plan");
        assert_eq!(plan.policy, PropensityPolicy::FullCompliance);
    }

    #[test]
    fn parses_partial_toml() {
        let input = r#"
[cohort]
subjects = 40
replications = 3
failure_policy = "skip"

[sampler.jitter]
free_virus = [0.9, 1.1]

[policy]
compliance = "partial"
confounding = true

[policy.confounder]
high_severity_prob = 0.7

[outcome]
biomarker = "free_virus"
time = 140
"#;
        let cfg: ExperimentConfig = toml::from_str(input).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.cohort.subjects, 40);
        assert_eq!(cfg.cohort.failure_policy, FailurePolicy::Skip);
        assert_eq!(cfg.sampler.jitter.free_virus.0, 0.9);
        assert_eq!(cfg.sampler.jitter.uninfected_t1.0, 0.45);
        assert_eq!(cfg.policy.confounder.high_severity_prob, 0.7);
        assert_eq!(cfg.policy.confounder.low_severity_prob, 0.2);
        assert_eq!(cfg.outcome.time, Some(140));
        assert!(matches!(
            cfg.plan().expect("plan").policy,
            PropensityPolicy::PartialComplianceConfounded { .. }
        ));
    }

    #[test]
    fn rejects_intervention_outside_horizon() {
        let mut cfg = ExperimentConfig::default();
        cfg.intervention.time = 150;
        let err = cfg.validate().expect_err("intervention");
        assert_eq!(err.field, "intervention.time");
    }

    #[test]
    fn rejects_invalid_file_with_path_context() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.toml");
        fs::write(&path, "[cohort]\nsubjects = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        let message = format!("{err:#}");
        assert!(message.contains("bad.toml"));
        assert!(message.contains("cohort.subjects"));
    }
}
