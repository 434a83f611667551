//! Diagnostics for dataset generation.
//!
//! Tracing output (replication progress, skipped subjects, simulator
//! traces) goes to stderr and is never part of a dataset. The record of a
//! run lives in `meta.json`, which is written regardless of `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber used by `benchgen`.
///
/// Filter comes from `RUST_LOG`, falling back to `warn` so that subjects
/// dropped under the skip policy still show up.
///
/// # Example
/// ```bash
/// RUST_LOG=counterfactual=debug benchgen generate hiv_full_compliance
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
