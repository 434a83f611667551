//! Outcome and covariate extractors.
//!
//! Extractors are plain data so experiments can be persisted and compared;
//! they never read anything but the trajectory they are handed.

use serde::{Deserialize, Serialize};

use crate::core::types::{Biomarker, Biomarkers, Trajectory};
use crate::error::{ConfigError, InvariantViolation};

/// Scalar outcome: one biomarker at one time (`[outcome]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeSpec {
    pub biomarker: Biomarker,
    /// Time index to read; `None` reads the final state.
    pub time: Option<usize>,
}

impl Default for OutcomeSpec {
    fn default() -> Self {
        Self {
            biomarker: Biomarker::InfectedT2,
            time: None,
        }
    }
}

impl OutcomeSpec {
    pub fn validate(&self, horizon: usize) -> Result<(), ConfigError> {
        if let Some(time) = self.time
            && time >= horizon
        {
            return Err(ConfigError::new(
                "outcome.time",
                format!("{time} must be < horizon {horizon}"),
            ));
        }
        Ok(())
    }

    pub fn extract(&self, trajectory: &Trajectory) -> Result<f64, InvariantViolation> {
        let len = trajectory.len();
        let time = self.time.unwrap_or(len.saturating_sub(1));
        trajectory
            .at(time)
            .map(|state| state.get(self.biomarker))
            .ok_or(InvariantViolation::MissingState { time, len })
    }
}

/// Covariate vector: selected biomarkers at the intervention time (`[covariates]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariateSpec {
    pub biomarkers: Vec<Biomarker>,
}

impl Default for CovariateSpec {
    fn default() -> Self {
        Self {
            biomarkers: Biomarker::ALL.to_vec(),
        }
    }
}

impl CovariateSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.biomarkers.is_empty() {
            return Err(ConfigError::new(
                "covariates.biomarkers",
                "must be a non-empty array",
            ));
        }
        for (index, biomarker) in self.biomarkers.iter().enumerate() {
            if self.biomarkers[..index].contains(biomarker) {
                return Err(ConfigError::new(
                    "covariates.biomarkers",
                    format!("duplicate {biomarker}"),
                ));
            }
        }
        Ok(())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.biomarkers.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn extract(&self, state: &Biomarkers) -> Vec<f64> {
        self.biomarkers.iter().map(|b| state.get(*b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PhysiologicalState;

    fn ramp(len: usize) -> Trajectory {
        let initial = PhysiologicalState {
            biomarkers: Biomarkers::baseline(),
            enrolled: false,
        };
        let states = (0..len).map(|t| Biomarkers::new([t as f64; 6])).collect();
        Trajectory::new(initial, states)
    }

    #[test]
    fn outcome_defaults_to_final_infected_t2() {
        let spec = OutcomeSpec::default();
        assert_eq!(spec.extract(&ramp(150)), Ok(149.0));
    }

    #[test]
    fn outcome_at_explicit_time() {
        let spec = OutcomeSpec {
            biomarker: Biomarker::FreeVirus,
            time: Some(10),
        };
        assert_eq!(spec.extract(&ramp(20)), Ok(10.0));
        assert_eq!(
            spec.extract(&ramp(5)),
            Err(InvariantViolation::MissingState { time: 10, len: 5 })
        );
        assert!(spec.validate(10).is_err());
        assert!(spec.validate(11).is_ok());
    }

    #[test]
    fn covariates_follow_configured_order() {
        let spec = CovariateSpec {
            biomarkers: vec![Biomarker::ImmuneResponse, Biomarker::UninfectedT1],
        };
        let state = Biomarkers::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(spec.extract(&state), vec![6.0, 1.0]);
        assert_eq!(spec.column_names(), vec!["immune_response", "uninfected_t1"]);
    }

    #[test]
    fn rejects_empty_or_duplicate_covariates() {
        let empty = CovariateSpec { biomarkers: vec![] };
        assert!(empty.validate().is_err());
        let dup = CovariateSpec {
            biomarkers: vec![Biomarker::FreeVirus, Biomarker::FreeVirus],
        };
        assert!(dup.validate().is_err());
        assert!(CovariateSpec::default().validate().is_ok());
    }
}
