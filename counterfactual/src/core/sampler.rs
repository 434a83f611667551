//! Covariate sampler: perturbed baseline states and enrollment.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::{Biomarker, Biomarkers, PhysiologicalState};
use crate::error::ConfigError;

/// Multiplicative jitter drawn uniformly from `[.0, .1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterRange(pub f64, pub f64);

impl Default for JitterRange {
    fn default() -> Self {
        Self(0.45, 2.15)
    }
}

impl JitterRange {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let JitterRange(lo, hi) = *self;
        if !lo.is_finite() || !hi.is_finite() {
            return Err(ConfigError::new(field, "bounds must be finite"));
        }
        if lo <= 0.0 {
            return Err(ConfigError::new(field, "lower bound must be > 0"));
        }
        if hi <= lo {
            return Err(ConfigError::new(field, "upper bound must exceed lower bound"));
        }
        Ok(())
    }
}

/// Per-biomarker jitter ranges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Jitter {
    pub uninfected_t1: JitterRange,
    pub infected_t1: JitterRange,
    pub uninfected_t2: JitterRange,
    pub infected_t2: JitterRange,
    pub free_virus: JitterRange,
    pub immune_response: JitterRange,
}

impl Jitter {
    pub fn range(&self, biomarker: Biomarker) -> JitterRange {
        match biomarker {
            Biomarker::UninfectedT1 => self.uninfected_t1,
            Biomarker::InfectedT1 => self.infected_t1,
            Biomarker::UninfectedT2 => self.uninfected_t2,
            Biomarker::InfectedT2 => self.infected_t2,
            Biomarker::FreeVirus => self.free_virus,
            Biomarker::ImmuneResponse => self.immune_response,
        }
    }
}

/// Sampler configuration (`[sampler]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub jitter: Jitter,
    /// Probability that a subject is enrolled in the study.
    pub enrollment_prob: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            jitter: Jitter::default(),
            enrollment_prob: 0.5,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for biomarker in Biomarker::ALL {
            self.jitter
                .range(biomarker)
                .validate(&format!("sampler.jitter.{biomarker}"))?;
        }
        if !(0.0..=1.0).contains(&self.enrollment_prob) {
            return Err(ConfigError::new(
                "sampler.enrollment_prob",
                format!("{} outside [0, 1]", self.enrollment_prob),
            ));
        }
        Ok(())
    }

    /// Draw an initial state: the six jitters in canonical order, then enrollment.
    pub fn sample<R: Rng + ?Sized>(&self, baseline: &Biomarkers, rng: &mut R) -> PhysiologicalState {
        let mut biomarkers = *baseline;
        for biomarker in Biomarker::ALL {
            let JitterRange(lo, hi) = self.jitter.range(biomarker);
            let factor = rng.gen_range(lo..hi);
            biomarkers.set(biomarker, baseline.get(biomarker) * factor);
        }
        let enrolled = rng.gen_range(0.0..1.0) < self.enrollment_prob;
        PhysiologicalState {
            biomarkers,
            enrolled,
        }
    }
}
