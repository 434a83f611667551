//! Dataset assembly: resolved records to a column-typed table.

use serde::{Deserialize, Serialize};

use crate::core::types::SubjectRecord;

/// Column holding the replication id in batched datasets.
pub const REPLICATION_COLUMN: &str = "experiment_number";

/// Records of one run, ordered by `(replication, subject)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    covariate_names: Vec<String>,
    batched: bool,
    records: Vec<SubjectRecord>,
}

impl Dataset {
    /// Build a dataset, sorting records into `(replication, subject)` order.
    pub fn new(covariate_names: Vec<String>, batched: bool, mut records: Vec<SubjectRecord>) -> Self {
        records.sort_by_key(|record| (record.replication, record.subject));
        Self {
            covariate_names,
            batched,
            records,
        }
    }

    pub fn records(&self) -> &[SubjectRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when rows carry a replication id column.
    pub fn is_batched(&self) -> bool {
        self.batched
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Records of one replication, in subject order.
    pub fn replication(&self, replication: u32) -> impl Iterator<Item = &SubjectRecord> {
        self.records
            .iter()
            .filter(move |record| record.replication == replication)
    }

    /// Project onto the persisted schema: covariates, `enrolled`, `treatment`,
    /// `outcome`, `true_effect`, and the replication id when batched.
    pub fn to_table(&self) -> Table {
        let mut columns: Vec<Column> = self
            .covariate_names
            .iter()
            .enumerate()
            .map(|(index, name)| Column::Float64 {
                name: name.clone(),
                values: self.records.iter().map(|r| r.covariates[index]).collect(),
            })
            .collect();
        columns.push(Column::Int64 {
            name: "enrolled".to_string(),
            values: self.records.iter().map(|r| i64::from(r.enrolled)).collect(),
        });
        columns.push(Column::Int64 {
            name: "treatment".to_string(),
            values: self.records.iter().map(|r| i64::from(r.treatment)).collect(),
        });
        columns.push(Column::Float64 {
            name: "outcome".to_string(),
            values: self.records.iter().map(|r| r.outcome).collect(),
        });
        columns.push(Column::Float64 {
            name: "true_effect".to_string(),
            values: self.records.iter().map(|r| r.true_effect).collect(),
        });
        if self.batched {
            columns.push(Column::Int64 {
                name: REPLICATION_COLUMN.to_string(),
                values: self
                    .records
                    .iter()
                    .map(|r| i64::from(r.replication))
                    .collect(),
            });
        }
        Table { columns }
    }
}

/// Column-oriented table with explicit value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "snake_case")]
pub enum Column {
    Float64 { name: String, values: Vec<f64> },
    Int64 { name: String, values: Vec<i64> },
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Float64 { name, .. } | Column::Int64 { name, .. } => name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float64 { values, .. } => values.len(),
            Column::Int64 { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell rendered for delimited output.
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            Column::Float64 { values, .. } => values.get(row).map(|v| v.to_string()),
            Column::Int64 { values, .. } => values.get(row).map(|v| v.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Column::Float64 { values, .. } => Some(values),
            Column::Int64 { .. } => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Column::Int64 { values, .. } => Some(values),
            Column::Float64 { .. } => None,
        }
    }
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Biomarker;

    fn record(replication: u32, subject: u32, treatment: bool) -> SubjectRecord {
        SubjectRecord {
            replication,
            subject,
            covariates: vec![subject as f64; 6],
            enrolled: treatment,
            treatment,
            propensity: if treatment { 1.0 } else { 0.0 },
            outcome: 2.0,
            true_effect: -0.5,
        }
    }

    fn names() -> Vec<String> {
        Biomarker::ALL.iter().map(|b| b.name().to_string()).collect()
    }

    #[test]
    fn records_are_ordered_by_replication_then_subject() {
        let dataset = Dataset::new(
            names(),
            true,
            vec![record(1, 0, true), record(0, 1, false), record(0, 0, true)],
        );
        let keys: Vec<(u32, u32)> = dataset
            .records()
            .iter()
            .map(|r| (r.replication, r.subject))
            .collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!(dataset.replication(0).count(), 2);
    }

    #[test]
    fn single_replication_table_has_ten_columns() {
        let dataset = Dataset::new(names(), false, vec![record(0, 0, true), record(0, 1, false)]);
        let table = dataset.to_table();
        assert_eq!(table.columns.len(), 10);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column_names()[6..],
            ["enrolled", "treatment", "outcome", "true_effect"]
        );
        assert!(table.column(REPLICATION_COLUMN).is_none());
        let treatment = table.column("treatment").and_then(Column::as_i64);
        assert_eq!(treatment, Some(&[1, 0][..]));
    }

    #[test]
    fn batched_table_appends_replication_id() {
        let dataset = Dataset::new(names(), true, vec![record(0, 0, true), record(3, 0, false)]);
        let table = dataset.to_table();
        assert_eq!(table.columns.len(), 11);
        let ids = table.column(REPLICATION_COLUMN).and_then(Column::as_i64);
        assert_eq!(ids, Some(&[0, 3][..]));
    }

    #[test]
    fn integer_columns_serialize_as_integers() {
        let dataset = Dataset::new(names(), false, vec![record(0, 0, true)]);
        let json = serde_json::to_string(&dataset.to_table()).expect("json");
        assert!(json.contains(r#"{"dtype":"int64","name":"enrolled","values":[1]}"#));
    }
}
