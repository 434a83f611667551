//! Replication orchestrator: fans subjects out to workers, merges results in
//! `(replication, subject)` order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::dataset::Dataset;
use crate::core::plan::ExperimentPlan;
use crate::core::resolver::resolve_subject;
use crate::core::seeds::ReplicationBasis;
use crate::core::types::SubjectRecord;
use crate::error::{ConfigError, RunError, SubjectError, describe};
use crate::sim::Simulator;

/// What to do when the simulator fails for a subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the run at the first failing `(replication, subject)`.
    #[default]
    Abort,
    /// Exclude failing subjects and report them.
    Skip,
}

/// Cohort size, seeding and scheduling (`[cohort]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub subjects: u32,
    pub replications: u32,
    pub seed: u64,
    /// Worker threads; 0 uses the available parallelism.
    pub workers: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            subjects: 500,
            replications: 1,
            seed: 123,
            workers: 0,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl CohortConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subjects == 0 {
            return Err(ConfigError::new("cohort.subjects", "must be > 0"));
        }
        if self.replications == 0 {
            return Err(ConfigError::new("cohort.replications", "must be > 0"));
        }
        Ok(())
    }

    /// Whether datasets carry a replication id column.
    pub fn is_batched(&self) -> bool {
        self.replications > 1
    }

    fn worker_count(&self, jobs: usize) -> usize {
        let requested = if self.workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        };
        requested.min(jobs).max(1)
    }
}

/// A subject excluded under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectFailure {
    pub replication: u32,
    pub subject: u32,
    pub error: SubjectError,
}

/// Dataset plus the subjects that were skipped.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    /// Skipped subjects in `(replication, subject)` order.
    pub failures: Vec<SubjectFailure>,
}

fn job_key(replication: u32, subject: u32) -> u64 {
    (u64::from(replication) << 32) | u64::from(subject)
}

fn is_fatal(err: &SubjectError, policy: FailurePolicy) -> bool {
    match err {
        SubjectError::Invariant(_) => true,
        SubjectError::Simulation { .. } => policy == FailurePolicy::Abort,
    }
}

type SubjectResult = (u32, u32, Result<SubjectRecord, SubjectError>);

/// Resolve every subject of every replication.
///
/// Output is identical for identical inputs regardless of worker count.
/// After a fatal failure, workers only skip jobs ordered after it, so the
/// error returned is always the earliest fatal one.
#[instrument(skip_all, fields(subjects = cohort.subjects, replications = cohort.replications, seed = cohort.seed))]
pub fn run_replications<S: Simulator + ?Sized>(
    simulator: &S,
    plan: &ExperimentPlan,
    cohort: &CohortConfig,
) -> Result<RunOutput, RunError> {
    cohort.validate()?;
    let total = cohort.subjects as usize * cohort.replications as usize;
    let workers = cohort.worker_count(total);
    let bases: Vec<ReplicationBasis> = (0..cohort.replications)
        .map(|replication| ReplicationBasis::new(cohort.seed, replication))
        .collect();
    let first_fatal = AtomicU64::new(u64::MAX);
    info!(workers, total, "resolving subjects");

    let (job_tx, job_rx) = bounded::<(u32, u32)>(workers * 4);
    let (result_tx, result_rx) = unbounded::<SubjectResult>();

    let (mut results, panicked) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let bases = &bases;
            let first_fatal = &first_fatal;
            handles.push(scope.spawn(move || {
                for (replication, subject) in job_rx.iter() {
                    let key = job_key(replication, subject);
                    if key > first_fatal.load(Ordering::SeqCst) {
                        continue;
                    }
                    let streams = bases[replication as usize].subject(subject);
                    let result = resolve_subject(simulator, plan, replication, subject, &streams);
                    if let Err(err) = &result
                        && is_fatal(err, cohort.failure_policy)
                    {
                        first_fatal.fetch_min(key, Ordering::SeqCst);
                    }
                    if result_tx.send((replication, subject, result)).is_err() {
                        break;
                    }
                }
                debug!(worker, "worker finished");
            }));
        }
        drop(job_rx);
        drop(result_tx);

        'dispatch: for replication in 0..cohort.replications {
            for subject in 0..cohort.subjects {
                if first_fatal.load(Ordering::SeqCst) != u64::MAX {
                    break 'dispatch;
                }
                if job_tx.send((replication, subject)).is_err() {
                    break 'dispatch;
                }
            }
        }
        drop(job_tx);

        let results: Vec<SubjectResult> = result_rx.iter().collect();
        let panicked = handles
            .into_iter()
            .map(|handle| handle.join())
            .any(|joined| joined.is_err());
        (results, panicked)
    });
    if panicked {
        return Err(RunError::WorkerPanicked);
    }

    results.sort_by_key(|(replication, subject, _)| job_key(*replication, *subject));
    let mut records = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (replication, subject, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(err) if is_fatal(&err, cohort.failure_policy) => {
                return Err(RunError::from_subject(replication, subject, err));
            }
            Err(err) => {
                warn!(replication, subject, error = %describe(&err), "subject skipped");
                failures.push(SubjectFailure {
                    replication,
                    subject,
                    error: err,
                });
            }
        }
    }

    for replication in 0..cohort.replications {
        let rows = records
            .iter()
            .filter(|r| r.replication == replication)
            .count();
        debug!(replication, rows, "replication resolved");
    }
    info!(
        rows = records.len(),
        failures = failures.len(),
        "subjects resolved"
    );

    Ok(RunOutput {
        dataset: Dataset::new(plan.covariate_names(), cohort.is_batched(), records),
        failures,
    })
}
