//! Dataset summaries for `benchgen report`: per-replication ATE and naive bias.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use counterfactual::core::dataset::{REPLICATION_COLUMN, Table};
use counterfactual::io::dataset_store::load_table;

use crate::results::{META_FILE, read_meta};

/// Per-replication statistics of a generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationSummary {
    pub replication: i64,
    pub rows: usize,
    pub treated: usize,
    /// Mean of `true_effect`: the ground-truth average treatment effect.
    pub ate: f64,
    /// Difference in mean `outcome` between treated and untreated rows.
    pub naive_difference: Option<f64>,
}

impl ReplicationSummary {
    pub fn treated_fraction(&self) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        self.treated as f64 / self.rows as f64
    }

    /// Confounding bias of the naive estimator.
    pub fn bias(&self) -> Option<f64> {
        self.naive_difference.map(|naive| naive - self.ate)
    }
}

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub rows: usize,
    pub failures: Option<usize>,
    pub replications: Vec<ReplicationSummary>,
}

impl ReportSummary {
    pub fn mean_ate(&self) -> Option<f64> {
        if self.replications.is_empty() {
            return None;
        }
        let total: f64 = self.replications.iter().map(|r| r.ate).sum();
        Some(total / self.replications.len() as f64)
    }
}

#[derive(Default)]
struct Accumulator {
    rows: usize,
    treated: usize,
    effect_sum: f64,
    treated_outcome: f64,
    control_outcome: f64,
}

/// Summarize the dataset stored in `dir`, with warnings for unusable pieces.
pub fn aggregate(dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let table = load_table(dir)?;
    let mut warnings = Vec::new();
    let mut summary = summarize(&table)?;

    let meta_path = dir.join(META_FILE);
    match read_meta(&meta_path) {
        Ok(meta) => {
            if meta.rows != summary.rows {
                warnings.push(format!(
                    "{} reports {} rows, dataset has {}",
                    meta_path.display(),
                    meta.rows,
                    summary.rows
                ));
            }
            summary.failures = Some(meta.failures.len());
        }
        Err(err) => warnings.push(format!("meta.json unavailable ({err:#})")),
    }

    for replication in &summary.replications {
        if replication.naive_difference.is_none() {
            warnings.push(format!(
                "replication {}: naive difference undefined ({} of {} treated)",
                replication.replication, replication.treated, replication.rows
            ));
        }
    }
    Ok((summary, warnings))
}

pub fn summarize(table: &Table) -> Result<ReportSummary> {
    let treatment = int_column(table, "treatment")?;
    let outcome = float_column(table, "outcome")?;
    let effect = float_column(table, "true_effect")?;
    let replication = match table.column(REPLICATION_COLUMN) {
        Some(column) => Some(
            column
                .as_i64()
                .ok_or_else(|| anyhow!("column {REPLICATION_COLUMN} must be int64"))?,
        ),
        None => None,
    };

    let mut groups: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for row in 0..table.row_count() {
        let key = replication.map_or(0, |ids| ids[row]);
        let acc = groups.entry(key).or_default();
        acc.rows += 1;
        acc.effect_sum += effect[row];
        if treatment[row] == 1 {
            acc.treated += 1;
            acc.treated_outcome += outcome[row];
        } else {
            acc.control_outcome += outcome[row];
        }
    }

    let replications = groups
        .into_iter()
        .map(|(replication, acc)| {
            let controls = acc.rows - acc.treated;
            let naive_difference = (acc.treated > 0 && controls > 0).then(|| {
                acc.treated_outcome / acc.treated as f64 - acc.control_outcome / controls as f64
            });
            ReplicationSummary {
                replication,
                rows: acc.rows,
                treated: acc.treated,
                ate: acc.effect_sum / acc.rows as f64,
                naive_difference,
            }
        })
        .collect();
    Ok(ReportSummary {
        rows: table.row_count(),
        failures: None,
        replications,
    })
}

fn int_column<'a>(table: &'a Table, name: &str) -> Result<&'a [i64]> {
    table
        .column(name)
        .with_context(|| format!("dataset missing column {name}"))?
        .as_i64()
        .ok_or_else(|| anyhow!("column {name} must be int64"))
}

fn float_column<'a>(table: &'a Table, name: &str) -> Result<&'a [f64]> {
    table
        .column(name)
        .with_context(|| format!("dataset missing column {name}"))?
        .as_f64()
        .ok_or_else(|| anyhow!("column {name} must be float64"))
}
