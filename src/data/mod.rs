pub mod loader;
pub mod preprocessing;
pub mod writer;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Cell values treated as missing, following the pandas `read_csv` defaults
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan",
    "null", "NULL", "None", "<NA>", "#N/A", "#NA", "#N/A N/A",
    "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

/// Check whether a raw cell counts as missing
pub fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

/// Schema violations found while loading or joining the input tables
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("table '{table}' has no column named '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}' has no data rows")]
    EmptyTable { table: String },

    #[error("sample '{sample}' appears more than once in the expression table")]
    DuplicateSample { sample: String },

    #[error("gene '{gene}' has non-numeric value '{value}' for sample '{sample}'")]
    NonNumericValue {
        gene: String,
        sample: String,
        value: String,
    },

    #[error("sample '{sample}' has unexpected status '{status}'")]
    UnexpectedStatus { sample: String, status: String },
}

/// Delimited table as read from disk, every cell kept as text
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Table name used in error messages
    pub name: String,
    /// Header row
    pub headers: Vec<String>,
    /// Data rows, each the same width as `headers`
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Position of a named column
    pub fn column_index(&self, column: &str) -> Result<usize, SchemaError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// How clinical status values outside the two known labels are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Anything other than the negative label becomes positive (reported, not rejected)
    #[default]
    Collapse,
    /// Statuses other than the negative and positive labels abort the run
    Strict,
}

/// Column names and label literals of the input tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalSchema {
    /// Identifier column of the expression table (gene names)
    pub expression_id_column: String,
    /// Sample identifier column of the clinical table
    pub sample_column: String,
    /// Categorical status column of the clinical table
    pub status_column: String,
    /// Status literal mapped to target 0, also used to fill missing statuses
    pub negative_label: String,
    /// Status literal expected for target 1
    pub positive_label: String,
    /// Handling of unexpected statuses
    pub label_policy: LabelPolicy,
}

impl Default for ClinicalSchema {
    fn default() -> Self {
        Self {
            expression_id_column: "sample".to_string(),
            sample_column: "sampleID".to_string(),
            status_column: "HER2_Final_Status_nature2012".to_string(),
            negative_label: "Negative".to_string(),
            positive_label: "Positive".to_string(),
            label_policy: LabelPolicy::default(),
        }
    }
}

/// Clinical row reduced to identifier and status
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRecord {
    /// Sample ID
    pub sample: String,
    /// Status, with missing values already filled
    pub status: String,
}

/// One sample after the join: target plus expression values in gene order
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Sample ID (kept for tracing, never written)
    pub sample: String,
    /// Binary target
    pub target: u8,
    /// Expression values, NaN where missing
    pub features: Vec<f64>,
}

impl SampleRecord {
    /// Check that every feature is present
    pub fn is_complete(&self) -> bool {
        self.features.iter().all(|v| !v.is_nan())
    }
}

/// Train/validation split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for validation
    pub val_ratio: f64,
    /// Random seed, drawn from entropy when unset
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            val_ratio: 0.2,
            seed: None,
        }
    }
}

/// Training and validation partitions
#[derive(Debug, Clone, Default)]
pub struct SplitDataset {
    /// Training rows
    pub train: Vec<SampleRecord>,
    /// Validation rows
    pub val: Vec<SampleRecord>,
}

impl SplitDataset {
    /// Total number of rows across both partitions
    pub fn total_rows(&self) -> usize {
        self.train.len() + self.val.len()
    }

    /// Output column count (target plus features)
    pub fn columns(&self) -> usize {
        self.train
            .first()
            .or_else(|| self.val.first())
            .map(|r| r.features.len() + 1)
            .unwrap_or(0)
    }

    /// Log shape and class distribution of both partitions
    pub fn log_summary(&self) {
        let columns = self.columns();
        let log_partition = |name: &str, data: &[SampleRecord]| {
            let pos = positive_count(data);
            info!(
                "The {} data has {} records and {} columns (positive={}, negative={}).",
                name,
                data.len(),
                columns,
                pos,
                data.len() - pos
            );
        };

        log_partition("training", &self.train);
        log_partition("validation", &self.val);
    }
}

/// Count rows with target 1
pub fn positive_count(data: &[SampleRecord]) -> usize {
    data.iter().filter(|r| r.target == 1).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing(""));
        assert!(is_missing("NA"));
        assert!(is_missing(" NaN "));
        assert!(!is_missing("0"));
        assert!(!is_missing("Negative"));
    }

    #[test]
    fn test_column_index_reports_table() {
        let table = RawTable {
            name: "clinical".to_string(),
            headers: vec!["sampleID".to_string()],
            rows: vec![],
        };

        assert_eq!(table.column_index("sampleID").unwrap(), 0);
        let err = table.column_index("status").unwrap_err();
        assert_eq!(
            err.to_string(),
            "table 'clinical' has no column named 'status'"
        );
    }

    #[test]
    fn test_is_complete() {
        let complete = SampleRecord {
            sample: "S1".to_string(),
            target: 1,
            features: vec![1.0, 2.0],
        };
        let partial = SampleRecord {
            sample: "S2".to_string(),
            target: 0,
            features: vec![1.0, f64::NAN],
        };

        assert!(complete.is_complete());
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_schema_defaults_from_json() {
        let schema: ClinicalSchema =
            serde_json::from_str(r#"{"label_policy": "strict"}"#).unwrap();
        assert_eq!(schema.sample_column, "sampleID");
        assert_eq!(schema.label_policy, LabelPolicy::Strict);
    }
}
