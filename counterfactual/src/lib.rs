//! Semi-synthetic benchmark datasets for causal-inference estimators.
//!
//! For every simulated subject the engine samples a perturbed baseline,
//! simulates both potential-outcome trajectories from a shared random basis,
//! assigns treatment from the untreated trajectory, and records the observed
//! outcome together with the ground-truth effect. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (sampling, propensity, resolution,
//!   seeding, table assembly). No I/O, fully testable in isolation.
//! - **[`sim`]**: The dynamical-system simulator behind the [`sim::Simulator`]
//!   trait, with the HIV model as the production implementation.
//! - **[`io`]**: Side-effecting operations (config files, dataset persistence).
//!
//! [`orchestrator`] fans subjects and replications out to worker threads and
//! merges them back in a reproducible order.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod sim;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
