//! Treatment-assignment propensity policies.
//!
//! Two independent axes (full vs partial compliance, confounded vs not) give
//! four closed variants. All branches are pure functions of the untreated
//! history up to the intervention time.

use serde::{Deserialize, Serialize};

use crate::core::types::HistoryView;
use crate::error::ConfigError;

/// Severity-dependent adherence used by the confounded variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfounderRule {
    pub immune_response_threshold: f64,
    pub free_virus_threshold: f64,
    /// Propensity when both biomarkers exceed their thresholds.
    pub high_severity_prob: f64,
    /// Propensity otherwise.
    pub low_severity_prob: f64,
}

impl Default for ConfounderRule {
    fn default() -> Self {
        Self {
            immune_response_threshold: 10.0,
            free_virus_threshold: 1.0,
            high_severity_prob: 0.8,
            low_severity_prob: 0.2,
        }
    }
}

impl ConfounderRule {
    fn evaluate(&self, history: &HistoryView<'_>) -> f64 {
        let state = history.current();
        if state.immune_response() > self.immune_response_threshold
            && state.free_virus() > self.free_virus_threshold
        {
            self.high_severity_prob
        } else {
            self.low_severity_prob
        }
    }
}

/// Closed set of assignment mechanisms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropensityPolicy {
    /// Enrolled subjects are always treated, others never.
    FullCompliance,
    /// Enrolled subjects adhere with `study_adherence`; others obtain
    /// treatment with `control_leakage`.
    PartialCompliance {
        study_adherence: f64,
        control_leakage: f64,
    },
    /// Enrolled adherence follows `rule`; others never treated.
    FullComplianceConfounded { rule: ConfounderRule },
    /// Enrolled adherence follows `rule`; others leak with `control_leakage`.
    PartialComplianceConfounded {
        control_leakage: f64,
        rule: ConfounderRule,
    },
}

impl PropensityPolicy {
    /// Treatment probability given the untreated history at the intervention time.
    pub fn propensity(&self, history: &HistoryView<'_>) -> f64 {
        let enrolled = history.enrolled();
        match *self {
            PropensityPolicy::FullCompliance => {
                if enrolled {
                    1.0
                } else {
                    0.0
                }
            }
            PropensityPolicy::PartialCompliance {
                study_adherence,
                control_leakage,
            } => {
                if enrolled {
                    study_adherence
                } else {
                    control_leakage
                }
            }
            PropensityPolicy::FullComplianceConfounded { rule } => {
                if enrolled {
                    rule.evaluate(history)
                } else {
                    0.0
                }
            }
            PropensityPolicy::PartialComplianceConfounded {
                control_leakage,
                rule,
            } => {
                if enrolled {
                    rule.evaluate(history)
                } else {
                    control_leakage
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compliance {
    Full,
    Partial,
}

/// Policy configuration (`[policy]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub compliance: Compliance,
    pub confounding: bool,
    /// Treatment probability for enrolled subjects under partial compliance.
    pub study_adherence: f64,
    /// Treatment probability for non-enrolled subjects under partial compliance.
    pub control_leakage: f64,
    pub confounder: ConfounderRule,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            compliance: Compliance::Full,
            confounding: false,
            study_adherence: 0.9,
            control_leakage: 0.05,
            confounder: ConfounderRule::default(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("policy.study_adherence", self.study_adherence)?;
        check_probability("policy.control_leakage", self.control_leakage)?;
        check_probability(
            "policy.confounder.high_severity_prob",
            self.confounder.high_severity_prob,
        )?;
        check_probability(
            "policy.confounder.low_severity_prob",
            self.confounder.low_severity_prob,
        )?;
        if !self.confounder.immune_response_threshold.is_finite() {
            return Err(ConfigError::new(
                "policy.confounder.immune_response_threshold",
                "must be finite",
            ));
        }
        if !self.confounder.free_virus_threshold.is_finite() {
            return Err(ConfigError::new(
                "policy.confounder.free_virus_threshold",
                "must be finite",
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> PropensityPolicy {
        match (self.compliance, self.confounding) {
            (Compliance::Full, false) => PropensityPolicy::FullCompliance,
            (Compliance::Partial, false) => PropensityPolicy::PartialCompliance {
                study_adherence: self.study_adherence,
                control_leakage: self.control_leakage,
            },
            (Compliance::Full, true) => PropensityPolicy::FullComplianceConfounded {
                rule: self.confounder,
            },
            (Compliance::Partial, true) => PropensityPolicy::PartialComplianceConfounded {
                control_leakage: self.control_leakage,
                rule: self.confounder,
            },
        }
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::new(field, format!("{value} outside [0, 1]")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Biomarker, Biomarkers, PhysiologicalState, Trajectory};

    fn trajectory(enrolled: bool, immune_response: f64, free_virus: f64) -> Trajectory {
        let mut state = Biomarkers::baseline();
        state.set(Biomarker::ImmuneResponse, immune_response);
        state.set(Biomarker::FreeVirus, free_virus);
        let initial = PhysiologicalState {
            biomarkers: state,
            enrolled,
        };
        Trajectory::new(initial, vec![state; 4])
    }

    fn propensity(policy: PropensityPolicy, enrolled: bool, immune: f64, virus: f64) -> f64 {
        let trajectory = trajectory(enrolled, immune, virus);
        let history = trajectory.history(2).expect("history");
        policy.propensity(&history)
    }

    fn all_policies() -> Vec<PropensityPolicy> {
        let mut policies = Vec::new();
        for compliance in [Compliance::Full, Compliance::Partial] {
            for confounding in [false, true] {
                policies.push(
                    PolicyConfig {
                        compliance,
                        confounding,
                        ..PolicyConfig::default()
                    }
                    .policy(),
                );
            }
        }
        policies
    }

    #[test]
    fn config_axes_select_each_variant() {
        let policies = all_policies();
        assert!(matches!(policies[0], PropensityPolicy::FullCompliance));
        assert!(matches!(
            policies[1],
            PropensityPolicy::FullComplianceConfounded { .. }
        ));
        assert!(matches!(
            policies[2],
            PropensityPolicy::PartialCompliance { .. }
        ));
        assert!(matches!(
            policies[3],
            PropensityPolicy::PartialComplianceConfounded { .. }
        ));
    }

    #[test]
    fn not_enrolled_branches() {
        let policies = all_policies();
        assert_eq!(propensity(policies[0], false, 50.0, 50.0), 0.0);
        assert_eq!(propensity(policies[1], false, 50.0, 50.0), 0.0);
        assert_eq!(propensity(policies[2], false, 50.0, 50.0), 0.05);
        assert_eq!(propensity(policies[3], false, 50.0, 50.0), 0.05);
    }

    #[test]
    fn enrolled_unconfounded_branches() {
        let policies = all_policies();
        assert_eq!(propensity(policies[0], true, 0.0, 0.0), 1.0);
        assert_eq!(propensity(policies[2], true, 0.0, 0.0), 0.9);
    }

    #[test]
    fn enrolled_confounded_ignores_compliance_mode() {
        let policies = all_policies();
        for policy in [policies[1], policies[3]] {
            assert_eq!(propensity(policy, true, 11.0, 2.0), 0.8);
            assert_eq!(propensity(policy, true, 11.0, 1.0), 0.2);
            assert_eq!(propensity(policy, true, 10.0, 2.0), 0.2);
            assert_eq!(propensity(policy, true, 5.0, 0.5), 0.2);
        }
    }

    #[test]
    fn confounder_reads_state_at_decision_time() {
        let initial = PhysiologicalState {
            biomarkers: Biomarkers::baseline(),
            enrolled: true,
        };
        let mut mild = Biomarkers::baseline();
        mild.set(Biomarker::ImmuneResponse, 1.0);
        let severe = Biomarkers::baseline();
        let trajectory = Trajectory::new(initial, vec![severe, mild, severe]);
        let policy = PolicyConfig {
            confounding: true,
            ..PolicyConfig::default()
        }
        .policy();

        let at_mild = trajectory.history(1).expect("history");
        assert_eq!(policy.propensity(&at_mild), 0.2);
        let at_severe = trajectory.history(2).expect("history");
        assert_eq!(policy.propensity(&at_severe), 0.8);
    }

    #[test]
    fn propensity_stays_in_unit_interval() {
        for policy in all_policies() {
            for enrolled in [false, true] {
                for (immune, virus) in [(0.0, 0.0), (100.0, 100.0), (11.0, 0.5)] {
                    let p = propensity(policy, enrolled, immune, virus);
                    assert!((0.0..=1.0).contains(&p));
                }
            }
        }
    }

    #[test]
    fn rejects_probability_outside_unit_interval() {
        let config = PolicyConfig {
            control_leakage: -0.1,
            ..PolicyConfig::default()
        };
        let err = config.validate().expect_err("leakage");
        assert_eq!(err.field, "policy.control_leakage");

        let mut config = PolicyConfig::default();
        config.confounder.high_severity_prob = 2.0;
        assert!(config.validate().is_err());
    }
}
