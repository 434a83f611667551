//! Dynamical-system simulator abstraction.
//!
//! The [`Simulator`] trait decouples the resolver from the model that
//! advances physiological state. [`hiv::HivSimulator`] is the production
//! model; tests use scripted simulators that return fixed trajectories.

pub mod hiv;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::seeds::RandomBasis;
use crate::core::types::{Biomarkers, Intervention, PhysiologicalState, Trajectory};
use crate::error::{ConfigError, SimulationError};

pub use hiv::{HivParams, HivSimulator};

const STEP_TOLERANCE: f64 = 1e-9;

/// Simulation settings shared by every subject of an experiment (`[simulation]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of recorded time steps (days); states are indexed `0..horizon`.
    pub horizon: usize,
    /// Integration step within one day. Must divide one day into a whole
    /// number of substeps.
    pub step_size: f64,
    /// Std-dev of multiplicative log-normal noise applied once per day.
    /// Zero gives deterministic dynamics.
    pub process_noise: f64,
    /// Wall-clock budget for a single `simulate` call.
    pub timeout_secs: u64,
    pub params: HivParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon: 150,
            step_size: 0.05,
            process_noise: 0.0,
            timeout_secs: 30,
            params: HivParams::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::new("simulation.horizon", "must be > 0"));
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 || self.step_size > 1.0 {
            return Err(ConfigError::new(
                "simulation.step_size",
                "must be in (0, 1]",
            ));
        }
        let substeps = (1.0 / self.step_size).round();
        if (substeps * self.step_size - 1.0).abs() > STEP_TOLERANCE {
            return Err(ConfigError::new(
                "simulation.step_size",
                format!("{} does not divide one day", self.step_size),
            ));
        }
        if !self.process_noise.is_finite() || self.process_noise < 0.0 {
            return Err(ConfigError::new(
                "simulation.process_noise",
                "must be finite and >= 0",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::new("simulation.timeout_secs", "must be > 0"));
        }
        self.params.validate()
    }

    /// Number of RK4 substeps per recorded day.
    pub fn substeps_per_day(&self) -> usize {
        (1.0 / self.step_size).round().max(1.0) as usize
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Advances a subject's state over the configured horizon.
///
/// Implementations must be deterministic given their inputs: the same
/// initial state, config, basis and intervention yield the same trajectory.
pub trait Simulator: Sync {
    /// Default state that the sampler jitters.
    fn baseline(&self) -> Biomarkers;

    /// Simulate `config.horizon` states starting from `initial`.
    fn simulate(
        &self,
        initial: &PhysiologicalState,
        config: &SimulationConfig,
        basis: &RandomBasis,
        intervention: Option<&Intervention>,
    ) -> Result<Trajectory, SimulationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_step(step_size: f64) -> SimulationConfig {
        SimulationConfig {
            step_size,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn accepts_steps_that_divide_a_day() {
        for step in [1.0, 0.5, 0.25, 0.1, 0.05, 0.01] {
            let config = with_step(step);
            config.validate().expect("valid step");
            assert!((config.substeps_per_day() as f64 * step - 1.0).abs() < 1e-12, "step {step}");
        }
    }

    #[test]
    fn rejects_step_that_does_not_divide_a_day() {
        for step in [0.3, 0.4, 0.7] {
            let err = with_step(step).validate().expect_err("uneven step");
            assert_eq!(err.field, "simulation.step_size");
            assert!(err.to_string().contains("does not divide one day"), "{err}");
        }
    }
}
