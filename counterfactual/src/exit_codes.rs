//! Stable exit codes for the dataset generator CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, invariant violation, or any other error.
pub const INVALID: i32 = 1;
/// A subject's simulation failed and the failure policy aborted the run.
pub const SIMULATION_FAILED: i32 = 2;
/// Writing the dataset or its metadata failed.
pub const PERSIST_FAILED: i32 = 3;
