//! Counterfactual resolver: one subject, both potential outcomes.

use rand::Rng;

use crate::core::invariants::{check_covariates, check_outcome, check_propensity};
use crate::core::plan::ExperimentPlan;
use crate::core::seeds::{RandomBasis, SubjectStreams};
use crate::core::types::{Intervention, PhysiologicalState, SubjectRecord, Trajectory};
use crate::error::{Branch, InvariantViolation, SimulationError, SubjectError};
use crate::sim::Simulator;

/// Resolve one subject.
///
/// Both branches are simulated from the same initial state and basis before
/// the treatment draw, so `true_effect` never depends on the assignment.
pub fn resolve_subject<S: Simulator + ?Sized>(
    simulator: &S,
    plan: &ExperimentPlan,
    replication: u32,
    subject: u32,
    streams: &SubjectStreams,
) -> Result<SubjectRecord, SubjectError> {
    let initial = plan
        .sampler
        .sample(&simulator.baseline(), &mut streams.covariate_rng());
    let basis = streams.basis();

    let untreated = simulate_branch(simulator, plan, &initial, &basis, None)?;
    let treated = simulate_branch(simulator, plan, &initial, &basis, Some(&plan.intervention))?;

    let decision_time = plan.intervention.time;
    let history = untreated
        .history(decision_time)
        .ok_or(InvariantViolation::MissingState {
            time: decision_time,
            len: untreated.len(),
        })?;
    let propensity = check_propensity(plan.policy.propensity(&history))?;
    let draw: f64 = streams.assignment_rng().gen_range(0.0..1.0);
    let treatment = draw < propensity;

    let untreated_outcome = check_outcome(plan.outcome.extract(&untreated)?)?;
    let treated_outcome = check_outcome(plan.outcome.extract(&treated)?)?;
    let outcome = if treatment {
        treated_outcome
    } else {
        untreated_outcome
    };

    let covariates = plan.covariates.extract(history.current());
    check_covariates(&plan.covariate_names(), &covariates)?;

    Ok(SubjectRecord {
        replication,
        subject,
        covariates,
        enrolled: initial.enrolled,
        treatment,
        propensity,
        outcome,
        true_effect: treated_outcome - untreated_outcome,
    })
}

fn simulate_branch<S: Simulator + ?Sized>(
    simulator: &S,
    plan: &ExperimentPlan,
    initial: &PhysiologicalState,
    basis: &RandomBasis,
    intervention: Option<&Intervention>,
) -> Result<Trajectory, SubjectError> {
    let branch = if intervention.is_some() {
        Branch::Treated
    } else {
        Branch::Untreated
    };
    let trajectory = simulator
        .simulate(initial, &plan.simulation, basis, intervention)
        .map_err(|source| SubjectError::Simulation { branch, source })?;
    let expected = plan.simulation.horizon;
    if trajectory.len() != expected {
        return Err(SubjectError::Simulation {
            branch,
            source: SimulationError::Truncated {
                expected,
                actual: trajectory.len(),
            },
        });
    }
    Ok(trajectory)
}
