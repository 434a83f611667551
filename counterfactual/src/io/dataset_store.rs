//! Persisted datasets: CSV for a single replication, typed JSON for batches.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::core::dataset::{Column, Dataset, REPLICATION_COLUMN, Table};
use crate::io::atomic::write_atomic;

pub const DATASET_CSV: &str = "dataset.csv";
pub const DATASET_JSON: &str = "dataset.json";

/// Columns stored as integers when reading CSV back.
const INTEGER_COLUMNS: [&str; 3] = ["enrolled", "treatment", REPLICATION_COLUMN];

/// Write `table` as comma-delimited text with a header row.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut buf = table.column_names().join(",");
    buf.push('\n');
    for row in 0..table.row_count() {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|column| column.cell(row).unwrap_or_default())
            .collect();
        buf.push_str(&cells.join(","));
        buf.push('\n');
    }
    write_atomic(path, buf.as_bytes())
}

pub fn write_json(path: &Path, table: &Table) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(table).context("serialize dataset json")?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes())
}

pub fn read_json(path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let table: Table =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    check_rectangular(&table).with_context(|| format!("validate {}", path.display()))?;
    Ok(table)
}

/// Read a CSV written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut lines = contents.lines().filter(|line| !line.is_empty());
    let Some(header) = lines.next() else {
        bail!("{} is empty", path.display());
    };
    let names: Vec<&str> = header.split(',').collect();
    let mut cells: Vec<Vec<&str>> = vec![Vec::new(); names.len()];
    for (index, line) in lines.enumerate() {
        let row: Vec<&str> = line.split(',').collect();
        if row.len() != names.len() {
            bail!(
                "{} row {}: expected {} cells, found {}",
                path.display(),
                index + 1,
                names.len(),
                row.len()
            );
        }
        for (column, cell) in cells.iter_mut().zip(row) {
            column.push(cell);
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for (name, raw) in names.into_iter().zip(cells) {
        let column = if INTEGER_COLUMNS.contains(&name) {
            let values = raw
                .iter()
                .map(|cell| cell.parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("{}: column {name}", path.display()))?;
            Column::Int64 {
                name: name.to_string(),
                values,
            }
        } else {
            let values = raw
                .iter()
                .map(|cell| cell.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("{}: column {name}", path.display()))?;
            Column::Float64 {
                name: name.to_string(),
                values,
            }
        };
        columns.push(column);
    }
    Ok(Table { columns })
}

/// File name a dataset is published under.
pub fn dataset_file_name(batched: bool) -> &'static str {
    if batched { DATASET_JSON } else { DATASET_CSV }
}

/// Publish `dataset` into `dir` and return the written path.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> Result<PathBuf> {
    let path = dir.join(dataset_file_name(dataset.is_batched()));
    let table = dataset.to_table();
    debug!(path = %path.display(), columns = table.columns.len(), "writing dataset");
    if dataset.is_batched() {
        write_json(&path, &table)?;
    } else {
        write_csv(&path, &table)?;
    }
    info!(path = %path.display(), rows = table.row_count(), "dataset written");
    Ok(path)
}

/// Load whichever dataset file exists in `dir`, preferring JSON.
pub fn load_table(dir: &Path) -> Result<Table> {
    let json = dir.join(DATASET_JSON);
    if json.exists() {
        return read_json(&json);
    }
    let csv = dir.join(DATASET_CSV);
    if csv.exists() {
        return read_csv(&csv);
    }
    bail!("no dataset found in {}", dir.display())
}

fn check_rectangular(table: &Table) -> Result<()> {
    let rows = table.row_count();
    for column in &table.columns {
        if column.len() != rows {
            bail!(
                "column {} has {} values, expected {rows}",
                column.name(),
                column.len()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Biomarker, SubjectRecord};

    fn record(replication: u32, subject: u32) -> SubjectRecord {
        SubjectRecord {
            replication,
            subject,
            covariates: vec![0.1 + f64::from(subject), 2.0, 3.5, 4.0, 5.25, 6.0],
            enrolled: subject % 2 == 0,
            treatment: subject % 2 == 0,
            propensity: 1.0,
            outcome: 42.125,
            true_effect: -3.0,
        }
    }

    fn names() -> Vec<String> {
        Biomarker::ALL.iter().map(|b| b.name().to_string()).collect()
    }

    #[test]
    fn csv_has_header_and_integer_cells() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(names(), false, vec![record(0, 0), record(0, 1)]);
        let path = write_dataset(temp.path(), &dataset).expect("write");
        assert_eq!(path, temp.path().join(DATASET_CSV));

        let contents = fs::read_to_string(&path).expect("read");
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some(
                "uninfected_t1,infected_t1,uninfected_t2,infected_t2,free_virus,immune_response,enrolled,treatment,outcome,true_effect"
            )
        );
        assert_eq!(lines.next(), Some("0.1,2,3.5,4,5.25,6,1,1,42.125,-3"));
        assert_eq!(lines.next(), Some("1.1,2,3.5,4,5.25,6,0,0,42.125,-3"));
        assert_eq!(lines.next(), None);
        assert!(!temp.path().join("dataset.csv.tmp").exists());
    }

    #[test]
    fn csv_reads_back_with_column_types() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(names(), false, vec![record(0, 0), record(0, 1)]);
        write_dataset(temp.path(), &dataset).expect("write");
        let table = load_table(temp.path()).expect("load");
        assert_eq!(table, dataset.to_table());
    }

    #[test]
    fn batched_dataset_is_written_as_typed_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dataset = Dataset::new(names(), true, vec![record(0, 0), record(1, 0)]);
        let path = write_dataset(temp.path(), &dataset).expect("write");
        assert_eq!(path, temp.path().join(DATASET_JSON));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        let last = &raw["columns"][10];
        assert_eq!(last["name"], REPLICATION_COLUMN);
        assert_eq!(last["dtype"], "int64");
        assert_eq!(last["values"], serde_json::json!([0, 1]));

        let table = load_table(temp.path()).expect("load");
        assert_eq!(table, dataset.to_table());
    }

    #[test]
    fn ragged_json_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DATASET_JSON);
        fs::write(
            &path,
            r#"{"columns":[{"dtype":"float64","name":"a","values":[1.0,2.0]},{"dtype":"int64","name":"b","values":[1]}]}"#,
        )
        .expect("write");
        let err = read_json(&path).expect_err("ragged");
        assert!(format!("{err:#}").contains("column b has 1 values"));
    }

    #[test]
    fn missing_dataset_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_table(temp.path()).expect_err("missing");
        assert!(err.to_string().contains("no dataset found"));
    }
}
