//! Deterministic, pure logic of the counterfactual engine.
//!
//! Core modules must be free of I/O side effects. Given the same seeds and
//! configuration they return the same values, which the tests rely on.

pub mod dataset;
pub mod extract;
pub mod invariants;
pub mod plan;
pub mod policy;
pub mod resolver;
pub mod sampler;
pub mod seeds;
pub mod types;
