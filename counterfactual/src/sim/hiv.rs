//! Six-compartment HIV within-host model with drug efficacies.
//!
//! Compartments follow [`Biomarker`] order: uninfected/infected type-1
//! cells, uninfected/infected type-2 cells, free virus, immune effectors.
//! `epsilon_1` scales infection (reverse-transcriptase inhibitor, reduced by
//! `f` in type-2 cells) and `epsilon_2` scales virion production (protease
//! inhibitor). Integrated with fixed-step RK4; one recorded state per day.

use std::f64::consts::PI;
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::seeds::RandomBasis;
use crate::core::types::{
    Biomarker, Biomarkers, Intervention, InterventionTarget, PhysiologicalState, Trajectory,
};
use crate::error::{ConfigError, SimulationError};
use crate::sim::{SimulationConfig, Simulator};

/// Model parameters (`[simulation.params]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HivParams {
    /// Type-1 target cell production rate.
    pub lambda_1: f64,
    pub d_1: f64,
    /// Type-1 infection rate.
    pub k_1: f64,
    /// Type-2 target cell production rate.
    pub lambda_2: f64,
    pub d_2: f64,
    pub k_2: f64,
    /// Reduction of `epsilon_1` efficacy in type-2 cells.
    pub f: f64,
    /// Infected cell death rate.
    pub delta: f64,
    /// Immune-induced clearance of infected cells.
    pub m_1: f64,
    pub m_2: f64,
    /// Virions produced per infected cell.
    pub n_t: f64,
    /// Virus clearance rate.
    pub c: f64,
    pub rho_1: f64,
    pub rho_2: f64,
    /// Immune effector production rate.
    pub lambda_e: f64,
    pub b_e: f64,
    pub k_b: f64,
    pub d_e: f64,
    pub k_d: f64,
    pub delta_e: f64,
    /// Baseline reverse-transcriptase inhibitor efficacy (standard care).
    pub epsilon_1: f64,
    /// Baseline protease inhibitor efficacy.
    pub epsilon_2: f64,
}

impl Default for HivParams {
    fn default() -> Self {
        Self {
            lambda_1: 10_000.0,
            d_1: 0.01,
            k_1: 8.0e-7,
            lambda_2: 31.98,
            d_2: 0.01,
            k_2: 1.0e-4,
            f: 0.34,
            delta: 0.7,
            m_1: 1.0e-5,
            m_2: 1.0e-5,
            n_t: 100.0,
            c: 13.0,
            rho_1: 1.0,
            rho_2: 1.0,
            lambda_e: 1.0,
            b_e: 0.3,
            k_b: 100.0,
            d_e: 0.25,
            k_d: 500.0,
            delta_e: 0.1,
            epsilon_1: 0.1,
            epsilon_2: 0.0,
        }
    }
}

impl HivParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("lambda_1", self.lambda_1),
            ("d_1", self.d_1),
            ("k_1", self.k_1),
            ("lambda_2", self.lambda_2),
            ("d_2", self.d_2),
            ("k_2", self.k_2),
            ("f", self.f),
            ("delta", self.delta),
            ("m_1", self.m_1),
            ("m_2", self.m_2),
            ("n_t", self.n_t),
            ("c", self.c),
            ("rho_1", self.rho_1),
            ("rho_2", self.rho_2),
            ("lambda_e", self.lambda_e),
            ("b_e", self.b_e),
            ("k_b", self.k_b),
            ("d_e", self.d_e),
            ("k_d", self.k_d),
            ("delta_e", self.delta_e),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::new(
                    format!("simulation.params.{name}"),
                    "must be finite and >= 0",
                ));
            }
        }
        check_efficacy("simulation.params.epsilon_1", self.epsilon_1)?;
        check_efficacy("simulation.params.epsilon_2", self.epsilon_2)?;
        Ok(())
    }
}

pub(crate) fn check_efficacy(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::new(field, format!("{value} outside [0, 1]")));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Efficacy {
    epsilon_1: f64,
    epsilon_2: f64,
}

impl Efficacy {
    fn at(params: &HivParams, intervention: Option<&Intervention>, time: usize) -> Self {
        let mut efficacy = Self {
            epsilon_1: params.epsilon_1,
            epsilon_2: params.epsilon_2,
        };
        if let Some(intervention) = intervention
            && time >= intervention.time
        {
            match intervention.target {
                InterventionTarget::Epsilon1 => efficacy.epsilon_1 = intervention.efficacy,
                InterventionTarget::Epsilon2 => efficacy.epsilon_2 = intervention.efficacy,
            }
        }
        efficacy
    }
}

type State = [f64; 6];

fn derivative(s: &State, p: &HivParams, eff: Efficacy) -> State {
    let [t1, t1_inf, t2, t2_inf, virus, effector] = *s;
    let infected = t1_inf + t2_inf;
    let rt_1 = 1.0 - eff.epsilon_1;
    let rt_2 = 1.0 - p.f * eff.epsilon_1;
    let infection_1 = rt_1 * p.k_1 * virus * t1;
    let infection_2 = rt_2 * p.k_2 * virus * t2;

    [
        p.lambda_1 - p.d_1 * t1 - infection_1,
        infection_1 - p.delta * t1_inf - p.m_1 * effector * t1_inf,
        p.lambda_2 - p.d_2 * t2 - infection_2,
        infection_2 - p.delta * t2_inf - p.m_2 * effector * t2_inf,
        (1.0 - eff.epsilon_2) * p.n_t * p.delta * infected
            - p.c * virus
            - (rt_1 * p.rho_1 * p.k_1 * t1 + rt_2 * p.rho_2 * p.k_2 * t2) * virus,
        p.lambda_e + p.b_e * infected / (infected + p.k_b) * effector
            - p.d_e * infected / (infected + p.k_d) * effector
            - p.delta_e * effector,
    ]
}

fn axpy(state: &State, rhs: &State, scale: f64) -> State {
    let mut out = *state;
    for (value, delta) in out.iter_mut().zip(rhs) {
        *value += scale * delta;
    }
    out
}

fn rk4_step(state: &State, dt: f64, p: &HivParams, eff: Efficacy) -> State {
    let k1 = derivative(state, p, eff);
    let k2 = derivative(&axpy(state, &k1, dt * 0.5), p, eff);
    let k3 = derivative(&axpy(state, &k2, dt * 0.5), p, eff);
    let k4 = derivative(&axpy(state, &k3, dt), p, eff);

    let mut out = *state;
    for i in 0..out.len() {
        out[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    out
}

/// Box-Muller standard normal.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen_range(0.0..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn check_state(time: usize, state: &Biomarkers) -> Result<(), SimulationError> {
    match state.first_invalid() {
        Some((biomarker, value)) => Err(SimulationError::InvalidState {
            time,
            biomarker,
            value,
        }),
        None => Ok(()),
    }
}

/// Production simulator for the HIV model.
#[derive(Debug, Clone, Copy, Default)]
pub struct HivSimulator;

impl Simulator for HivSimulator {
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
        let started = Instant::now();
        let timeout = config.timeout();
        let substeps = config.substeps_per_day();
        let dt = 1.0 / substeps as f64;
        let mut rng = basis.rng();

        check_state(0, &initial.biomarkers)?;
        let mut states = Vec::with_capacity(config.horizon);
        states.push(initial.biomarkers);
        let mut current = *initial.biomarkers.values();

        for time in 0..config.horizon.saturating_sub(1) {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(SimulationError::Timeout {
                    time,
                    elapsed_ms: elapsed.as_millis(),
                });
            }
            let efficacy = Efficacy::at(&config.params, intervention, time);
            for _ in 0..substeps {
                current = rk4_step(&current, dt, &config.params, efficacy);
            }
            if config.process_noise > 0.0 {
                for value in &mut current {
                    *value *= (config.process_noise * standard_normal(&mut rng)).exp();
                }
            }
            let next = Biomarkers::new(current);
            check_state(time + 1, &next)?;
            states.push(next);
        }

        trace!(
            horizon = config.horizon,
            treated = intervention.is_some(),
            final_infected_t2 = states[states.len() - 1].get(Biomarker::InfectedT2),
            "trajectory simulated"
        );
        Ok(Trajectory::new(*initial, states))
    }
}
