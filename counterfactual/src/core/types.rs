//! Shared deterministic types for the counterfactual engine.
//!
//! These types define stable contracts between the sampler, the policy, the
//! resolver and the simulator. They carry no I/O and must remain
//! deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the six tracked physiological quantities.
///
/// Declaration order is the canonical covariate column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biomarker {
    UninfectedT1,
    InfectedT1,
    UninfectedT2,
    InfectedT2,
    FreeVirus,
    ImmuneResponse,
}

impl Biomarker {
    pub const ALL: [Biomarker; 6] = [
        Biomarker::UninfectedT1,
        Biomarker::InfectedT1,
        Biomarker::UninfectedT2,
        Biomarker::InfectedT2,
        Biomarker::FreeVirus,
        Biomarker::ImmuneResponse,
    ];

    /// Column name used in persisted datasets.
    pub fn name(self) -> &'static str {
        match self {
            Biomarker::UninfectedT1 => "uninfected_t1",
            Biomarker::InfectedT1 => "infected_t1",
            Biomarker::UninfectedT2 => "uninfected_t2",
            Biomarker::InfectedT2 => "infected_t2",
            Biomarker::FreeVirus => "free_virus",
            Biomarker::ImmuneResponse => "immune_response",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Biomarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values of all six biomarkers at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biomarkers {
    values: [f64; 6],
}

impl Biomarkers {
    pub fn new(values: [f64; 6]) -> Self {
        Self { values }
    }

    /// Default baseline state of the HIV model (untreated steady state).
    pub fn baseline() -> Self {
        Self::new([163_573.0, 11_945.0, 5.0, 46.0, 63_919.0, 24.0])
    }

    pub fn get(&self, biomarker: Biomarker) -> f64 {
        self.values[biomarker.index()]
    }

    pub fn set(&mut self, biomarker: Biomarker, value: f64) {
        self.values[biomarker.index()] = value;
    }

    pub fn values(&self) -> &[f64; 6] {
        &self.values
    }

    pub fn immune_response(&self) -> f64 {
        self.get(Biomarker::ImmuneResponse)
    }

    pub fn free_virus(&self) -> f64 {
        self.get(Biomarker::FreeVirus)
    }

    /// First biomarker whose value is negative or not finite.
    pub fn first_invalid(&self) -> Option<(Biomarker, f64)> {
        Biomarker::ALL
            .into_iter()
            .map(|biomarker| (biomarker, self.get(biomarker)))
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
    }
}

/// Sampled initial state of one subject.
///
/// Produced once by the sampler and never mutated; later states come from the
/// simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysiologicalState {
    pub biomarkers: Biomarkers,
    pub enrolled: bool,
}

/// Simulator parameter an intervention overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterventionTarget {
    /// Reverse-transcriptase inhibitor efficacy.
    #[serde(rename = "epsilon_1")]
    Epsilon1,
    /// Protease inhibitor efficacy.
    #[serde(rename = "epsilon_2")]
    Epsilon2,
}

/// A single parameter change applied from `time` to the end of the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervention {
    /// Time index at which the new value takes effect.
    pub time: usize,
    pub target: InterventionTarget,
    /// Parameter value once the intervention is active.
    pub efficacy: f64,
}

impl Default for Intervention {
    fn default() -> Self {
        Self {
            time: 100,
            target: InterventionTarget::Epsilon1,
            efficacy: 0.5,
        }
    }
}

/// Simulated states over time indices `0..len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    initial: PhysiologicalState,
    states: Vec<Biomarkers>,
}

impl Trajectory {
    pub fn new(initial: PhysiologicalState, states: Vec<Biomarkers>) -> Self {
        Self { initial, states }
    }

    pub fn initial(&self) -> &PhysiologicalState {
        &self.initial
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn at(&self, time: usize) -> Option<&Biomarkers> {
        self.states.get(time)
    }

    pub fn states(&self) -> &[Biomarkers] {
        &self.states
    }

    /// Borrow the history `0..=time`, or `None` when `time` is out of range.
    pub fn history(&self, time: usize) -> Option<HistoryView<'_>> {
        if time >= self.states.len() {
            return None;
        }
        Some(HistoryView {
            enrolled: self.initial.enrolled,
            states: &self.states[..=time],
        })
    }
}

/// Non-empty prefix of a trajectory ending at a decision time.
///
/// This is the only view of a trajectory the propensity policy receives, so
/// later states cannot leak into treatment assignment.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    enrolled: bool,
    states: &'a [Biomarkers],
}

impl<'a> HistoryView<'a> {
    pub fn enrolled(&self) -> bool {
        self.enrolled
    }

    /// State at the decision time.
    pub fn current(&self) -> &'a Biomarkers {
        // `Trajectory::history` never builds an empty view.
        &self.states[self.states.len() - 1]
    }

    pub fn states(&self) -> &'a [Biomarkers] {
        self.states
    }
}

/// One resolved subject. Created once per subject per replication.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRecord {
    pub replication: u32,
    pub subject: u32,
    /// Covariates read from the untreated branch at the intervention time.
    pub covariates: Vec<f64>,
    pub enrolled: bool,
    pub treatment: bool,
    pub propensity: f64,
    pub outcome: f64,
    pub true_effect: f64,
}
