//! Validated, immutable description of one experiment's subject pipeline.

use crate::core::extract::{CovariateSpec, OutcomeSpec};
use crate::core::policy::PropensityPolicy;
use crate::core::sampler::SamplerConfig;
use crate::core::types::Intervention;
use crate::sim::SimulationConfig;

/// Everything the resolver needs, shared read-only by all workers.
///
/// Built by `ExperimentConfig::plan` after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentPlan {
    pub sampler: SamplerConfig,
    pub simulation: SimulationConfig,
    pub intervention: Intervention,
    pub policy: PropensityPolicy,
    pub outcome: OutcomeSpec,
    pub covariates: CovariateSpec,
}

impl ExperimentPlan {
    /// Covariate column names, without the enrollment column.
    pub fn covariate_names(&self) -> Vec<String> {
        self.covariates.column_names()
    }
}
