//! Test-only helpers: scripted simulators and small experiment plans.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::extract::{CovariateSpec, OutcomeSpec};
use crate::core::plan::ExperimentPlan;
use crate::core::policy::PolicyConfig;
use crate::core::sampler::SamplerConfig;
use crate::core::seeds::RandomBasis;
use crate::core::types::{Biomarker, Biomarkers, Intervention, PhysiologicalState, Trajectory};
use crate::error::SimulationError;
use crate::sim::{SimulationConfig, Simulator};

/// Horizon used by [`plan_with_policy`].
pub const SCRIPTED_HORIZON: usize = 20;
/// Intervention time used by [`plan_with_policy`].
pub const SCRIPTED_INTERVENTION_TIME: usize = 10;

/// Simulator returning closed-form trajectories.
///
/// Untreated level at time `t` is `base + 0.5 * t` for every biomarker. The
/// treated branch adds `effect * (t - intervention.time)` after the
/// intervention time. Levels set with [`ScriptedSimulator::with_level`] are
/// constant in both branches.
#[derive(Debug, Default)]
pub struct ScriptedSimulator {
    base: f64,
    effect: f64,
    fixed: Vec<(Biomarker, f64)>,
    len: Option<usize>,
    fail_treated: bool,
    fail_bases: Vec<u64>,
    calls: AtomicUsize,
}

impl ScriptedSimulator {
    pub fn step(base: f64, effect: f64) -> Self {
        Self {
            base,
            effect,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, biomarker: Biomarker, value: f64) -> Self {
        self.fixed.push((biomarker, value));
        self
    }

    /// Return trajectories of `len` states regardless of the horizon.
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// Fail every treated-branch simulation.
    pub fn failing_treated(mut self) -> Self {
        self.fail_treated = true;
        self
    }

    /// Fail both branches for subjects whose simulation basis is in `seeds`.
    pub fn failing_for(mut self, seeds: Vec<u64>) -> Self {
        self.fail_bases = seeds;
        self
    }

    /// Number of `simulate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Level of unfixed biomarkers at `time`.
    pub fn level_at(&self, time: usize, intervention: Option<&Intervention>) -> f64 {
        let mut level = self.base + 0.5 * time as f64;
        if let Some(intervention) = intervention
            && time > intervention.time
        {
            level += self.effect * (time - intervention.time) as f64;
        }
        level
    }

    fn state_at(&self, time: usize, intervention: Option<&Intervention>) -> Biomarkers {
        let mut state = Biomarkers::new([self.level_at(time, intervention); 6]);
        for (biomarker, value) in &self.fixed {
            state.set(*biomarker, *value);
        }
        state
    }
}

impl Simulator for ScriptedSimulator {
    fn baseline(&self) -> Biomarkers {
        Biomarkers::baseline()
    }

    fn simulate(
        &self,
        initial: &PhysiologicalState,
        config: &SimulationConfig,
        basis: &RandomBasis,
        intervention: Option<&Intervention>,
    ) -> Result<Trajectory, SimulationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_bases.contains(&basis.seed()) {
            return Err(SimulationError::Failed(format!(
                "scripted failure for basis {}",
                basis.seed()
            )));
        }
        if self.fail_treated && intervention.is_some() {
            return Err(SimulationError::Failed("scripted treated failure".to_string()));
        }
        let len = self.len.unwrap_or(config.horizon);
        let states = (0..len)
            .map(|time| self.state_at(time, intervention))
            .collect();
        Ok(Trajectory::new(*initial, states))
    }
}

/// Small plan around [`SCRIPTED_HORIZON`] with the given policy.
pub fn plan_with_policy(policy: PolicyConfig) -> ExperimentPlan {
    ExperimentPlan {
        sampler: SamplerConfig::default(),
        simulation: SimulationConfig {
            horizon: SCRIPTED_HORIZON,
            ..SimulationConfig::default()
        },
        intervention: Intervention {
            time: SCRIPTED_INTERVENTION_TIME,
            ..Intervention::default()
        },
        policy: policy.policy(),
        outcome: OutcomeSpec::default(),
        covariates: CovariateSpec::default(),
    }
}
