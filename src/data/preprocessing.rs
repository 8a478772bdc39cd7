//! Clinical subsetting, expression reorientation, join, labelling and splitting

use crate::data::loader::RowSink;
use crate::data::{
    is_missing, ClinicalRecord, ClinicalSchema, LabelPolicy, RawTable, SampleRecord, SchemaError,
    SplitConfig, SplitDataset,
};
use anyhow::{bail, Result};
use csv::StringRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Keep only sample ID and status from the clinical table, filling missing statuses
/// with the negative label
pub fn subset_clinical(
    table: &RawTable,
    schema: &ClinicalSchema,
) -> Result<Vec<ClinicalRecord>, SchemaError> {
    let sample_idx = table.column_index(&schema.sample_column)?;
    let status_idx = table.column_index(&schema.status_column)?;

    let records: Vec<ClinicalRecord> = table
        .rows
        .iter()
        .map(|row| {
            let status = &row[status_idx];
            ClinicalRecord {
                sample: row[sample_idx].clone(),
                status: if is_missing(status) {
                    schema.negative_label.clone()
                } else {
                    status.clone()
                },
            }
        })
        .collect();

    debug!(
        "Clinical subset: {} rows, dropped {} columns",
        records.len(),
        table.headers.len().saturating_sub(2)
    );
    Ok(records)
}

/// Expression values reoriented so each sample owns one row of gene values
#[derive(Debug, Clone, Default)]
pub struct ExpressionMatrix {
    /// Gene names in file order
    genes: Vec<String>,
    /// Sample IDs in header order
    samples: Vec<String>,
    /// Row index of each sample
    index: HashMap<String, usize>,
    /// `values[sample][gene]`, NaN where missing
    values: Vec<Vec<f64>>,
    /// Identifier column in the source table
    id_column: String,
    id_idx: usize,
}

impl ExpressionMatrix {
    /// Empty matrix expecting `id_column` as the gene identifier column
    pub fn new(id_column: &str) -> Self {
        Self {
            id_column: id_column.to_string(),
            ..Default::default()
        }
    }

    /// Reorient an in-memory genes x samples table
    pub fn from_table(table: &RawTable, id_column: &str) -> Result<Self> {
        let mut matrix = Self::new(id_column);
        matrix.headers(&table.name, &table.headers)?;
        for row in &table.rows {
            matrix.row(&StringRecord::from(row.clone()))?;
        }
        Ok(matrix)
    }

    /// Gene names, in output column order
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Sample IDs, in source column order
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Gene values of one sample
    pub fn sample_values(&self, sample: &str) -> Option<&[f64]> {
        self.index.get(sample).map(|&i| self.values[i].as_slice())
    }
}

impl RowSink for ExpressionMatrix {
    fn headers(&mut self, table: &str, headers: &[String]) -> Result<()> {
        self.id_idx = headers
            .iter()
            .position(|h| *h == self.id_column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: table.to_string(),
                column: self.id_column.clone(),
            })?;

        for (i, sample) in headers.iter().enumerate() {
            if i == self.id_idx {
                continue;
            }
            if self.index.insert(sample.clone(), self.samples.len()).is_some() {
                return Err(SchemaError::DuplicateSample {
                    sample: sample.clone(),
                }
                .into());
            }
            self.samples.push(sample.clone());
        }
        self.values = vec![Vec::new(); self.samples.len()];
        Ok(())
    }

    fn row(&mut self, record: &StringRecord) -> Result<()> {
        let gene = record.get(self.id_idx).unwrap_or_default().to_string();

        let mut column = 0;
        for (i, cell) in record.iter().enumerate() {
            if i == self.id_idx {
                continue;
            }
            let value = if is_missing(cell) {
                f64::NAN
            } else {
                cell.trim()
                    .parse::<f64>()
                    .map_err(|_| SchemaError::NonNumericValue {
                        gene: gene.clone(),
                        sample: self.samples[column].clone(),
                        value: cell.to_string(),
                    })?
            };
            self.values[column].push(value);
            column += 1;
        }

        self.genes.push(gene);
        Ok(())
    }
}

/// Counts of derived labels, including statuses outside the two known labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    /// Rows labelled 0
    pub negative: usize,
    /// Rows labelled 1
    pub positive: usize,
    /// Statuses that were neither the negative nor the positive label, with counts
    pub unexpected: BTreeMap<String, usize>,
}

impl LabelStats {
    /// Number of rows whose status was neither known label
    pub fn unexpected_total(&self) -> usize {
        self.unexpected.values().sum()
    }
}

/// Map a clinical status to the binary target: 0 for the negative label, 1 for anything else.
///
/// Statuses other than the two known labels still map to 1 under `LabelPolicy::Collapse`,
/// and are rejected under `LabelPolicy::Strict`.
pub fn derive_label(record: &ClinicalRecord, schema: &ClinicalSchema) -> Result<u8, SchemaError> {
    if record.status == schema.negative_label {
        return Ok(0);
    }
    if record.status != schema.positive_label && schema.label_policy == LabelPolicy::Strict {
        return Err(SchemaError::UnexpectedStatus {
            sample: record.sample.clone(),
            status: record.status.clone(),
        });
    }
    Ok(1)
}

/// Joined table before and after the completeness filter
#[derive(Debug, Clone)]
pub struct MergedTable {
    /// Feature names in column order
    pub genes: Vec<String>,
    /// One row per clinical record
    pub records: Vec<SampleRecord>,
    /// Label counts over all joined rows
    pub label_stats: LabelStats,
}

impl MergedTable {
    /// Drop every row with a missing value, returning how many were removed
    pub fn drop_incomplete(&mut self) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(SampleRecord::is_complete);
        let dropped = before - self.records.len();

        info!(
            "Completeness filter kept {} of {} rows ({} dropped)",
            self.records.len(),
            before,
            dropped
        );

        if self.records.is_empty() {
            bail!("No rows left after dropping rows with missing values");
        }
        Ok(dropped)
    }

    /// Output column count (target plus features)
    pub fn columns(&self) -> usize {
        self.genes.len() + 1
    }
}

/// Left-join clinical records with the expression matrix on sample ID and derive targets.
///
/// Every clinical record yields one row, in clinical order. Samples absent from the
/// expression matrix get all-missing features.
pub fn merge(
    clinical: &[ClinicalRecord],
    expression: &ExpressionMatrix,
    schema: &ClinicalSchema,
) -> Result<MergedTable> {
    let n_genes = expression.genes().len();
    let mut label_stats = LabelStats::default();
    let mut records = Vec::with_capacity(clinical.len());
    let mut unmatched = 0;

    for record in clinical {
        let target = derive_label(record, schema)?;
        if target == 0 {
            label_stats.negative += 1;
        } else {
            label_stats.positive += 1;
            if record.status != schema.positive_label {
                *label_stats
                    .unexpected
                    .entry(record.status.clone())
                    .or_default() += 1;
            }
        }

        let features = match expression.sample_values(&record.sample) {
            Some(values) => values.to_vec(),
            None => {
                unmatched += 1;
                vec![f64::NAN; n_genes]
            }
        };

        records.push(SampleRecord {
            sample: record.sample.clone(),
            target,
            features,
        });
    }

    info!(
        "Merged {} clinical rows with {} expression samples ({} without expression data)",
        clinical.len(),
        expression.samples().len(),
        unmatched
    );

    if !label_stats.unexpected.is_empty() {
        warn!(
            "{} rows have a status other than '{}' or '{}' and were labelled positive: {:?}",
            label_stats.unexpected_total(),
            schema.negative_label,
            schema.positive_label,
            label_stats.unexpected
        );
    }

    Ok(MergedTable {
        genes: expression.genes().to_vec(),
        records,
        label_stats,
    })
}

/// Randomly partition rows into training and validation sets.
///
/// The validation set receives `ceil(val_ratio * n)` rows, the training set the rest.
/// Both partitions must end up non-empty.
pub fn split<R: Rng + ?Sized>(
    records: Vec<SampleRecord>,
    config: &SplitConfig,
    rng: &mut R,
) -> Result<SplitDataset> {
    let ratio = config.val_ratio;
    if !(ratio > 0.0 && ratio < 1.0) {
        bail!("Validation ratio must be strictly between 0 and 1, got {}", ratio);
    }

    let n = records.len();
    let n_val = (ratio * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_val);
    if n_val == 0 || n_train == 0 {
        bail!(
            "Cannot split {} rows with validation ratio {}: a partition would be empty",
            n,
            ratio
        );
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut is_val = vec![false; n];
    for &i in &order[..n_val] {
        is_val[i] = true;
    }

    // Partitions follow the shuffled order
    let mut slots: Vec<Option<SampleRecord>> = records.into_iter().map(Some).collect();
    let mut dataset = SplitDataset::default();
    for &i in &order {
        if let Some(record) = slots[i].take() {
            if is_val[i] {
                dataset.val.push(record);
            } else {
                dataset.train.push(record);
            }
        }
    }

    info!(
        "Dataset split: train={}, val={}",
        dataset.train.len(),
        dataset.val.len()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{FileFormat, TableLoader};
    use crate::utils::random::seeded_rng;
    use std::collections::HashSet;
    use std::io::Cursor;

    fn parse(data: &str, name: &str) -> RawTable {
        TableLoader::new()
            .parse(Cursor::new(data), FileFormat::Tsv, name)
            .unwrap()
    }

    fn clinical_table() -> RawTable {
        parse(
            "sampleID\tage\tHER2_Final_Status_nature2012\n\
             S1\t50\tPositive\n\
             S2\t61\t\n\
             S3\t47\tNegative\n",
            "clinical",
        )
    }

    fn expression_table() -> RawTable {
        parse(
            "sample\tS3\tS1\tS2\n\
             TP53\t1.0\t2.0\t3.0\n\
             ERBB2\t4.0\t5.0\t6.0\n",
            "expression",
        )
    }

    fn records(n: usize) -> Vec<SampleRecord> {
        (0..n)
            .map(|i| SampleRecord {
                sample: format!("S{}", i),
                target: (i % 2) as u8,
                features: vec![i as f64],
            })
            .collect()
    }

    #[test]
    fn test_subset_clinical_fills_missing_status() {
        let schema = ClinicalSchema::default();
        let subset = subset_clinical(&clinical_table(), &schema).unwrap();

        assert_eq!(subset.len(), 3);
        assert_eq!(subset[1].sample, "S2");
        assert_eq!(subset[1].status, "Negative");
        assert_eq!(subset[0].status, "Positive");
    }

    #[test]
    fn test_subset_clinical_missing_status_column() {
        let schema = ClinicalSchema {
            status_column: "ER_Status".to_string(),
            ..Default::default()
        };
        let err = subset_clinical(&clinical_table(), &schema).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                table: "clinical".to_string(),
                column: "ER_Status".to_string(),
            }
        );
    }

    #[test]
    fn test_expression_reorientation() {
        let matrix = ExpressionMatrix::from_table(&expression_table(), "sample").unwrap();

        assert_eq!(matrix.genes(), &["TP53".to_string(), "ERBB2".to_string()]);
        assert_eq!(matrix.samples().len(), 3);
        assert_eq!(matrix.sample_values("S1").unwrap(), &[2.0, 5.0]);
        assert_eq!(matrix.sample_values("S3").unwrap(), &[1.0, 4.0]);
        assert!(matrix.sample_values("S9").is_none());
    }

    #[test]
    fn test_expression_missing_id_column() {
        let err = ExpressionMatrix::from_table(&expression_table(), "gene").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_expression_duplicate_sample() {
        let table = parse("sample\tS1\tS1\nTP53\t1.0\t2.0\n", "expression");
        let err = ExpressionMatrix::from_table(&table, "sample").unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::DuplicateSample { sample: "S1".to_string() })
        );
    }

    #[test]
    fn test_expression_non_numeric_value() {
        let table = parse("sample\tS1\nTP53\thigh\n", "expression");
        let err = ExpressionMatrix::from_table(&table, "sample").unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::NonNumericValue {
                gene: "TP53".to_string(),
                sample: "S1".to_string(),
                value: "high".to_string(),
            })
        );
    }

    #[test]
    fn test_expression_missing_values_become_nan() {
        let table = parse("sample\tS1\tS2\nTP53\tNA\t1.5\n", "expression");
        let matrix = ExpressionMatrix::from_table(&table, "sample").unwrap();
        assert!(matrix.sample_values("S1").unwrap()[0].is_nan());
        assert_eq!(matrix.sample_values("S2").unwrap(), &[1.5]);
    }

    #[test]
    fn test_derive_label() {
        let schema = ClinicalSchema::default();
        let record = |status: &str| ClinicalRecord {
            sample: "S".to_string(),
            status: status.to_string(),
        };

        assert_eq!(derive_label(&record("Negative"), &schema).unwrap(), 0);
        assert_eq!(derive_label(&record("Positive"), &schema).unwrap(), 1);
        assert_eq!(derive_label(&record("Equivocal"), &schema).unwrap(), 1);
    }

    #[test]
    fn test_derive_label_strict() {
        let schema = ClinicalSchema {
            label_policy: LabelPolicy::Strict,
            ..Default::default()
        };
        let record = ClinicalRecord {
            sample: "S7".to_string(),
            status: "Equivocal".to_string(),
        };

        assert_eq!(
            derive_label(&record, &schema).unwrap_err(),
            SchemaError::UnexpectedStatus {
                sample: "S7".to_string(),
                status: "Equivocal".to_string(),
            }
        );
    }

    #[test]
    fn test_merge_three_samples() {
        let schema = ClinicalSchema::default();
        let clinical = subset_clinical(&clinical_table(), &schema).unwrap();
        let matrix = ExpressionMatrix::from_table(&expression_table(), "sample").unwrap();

        let mut merged = merge(&clinical, &matrix, &schema).unwrap();
        assert_eq!(merged.drop_incomplete().unwrap(), 0);

        let targets: Vec<u8> = merged.records.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![1, 0, 0]);
        assert_eq!(merged.records[0].features, vec![2.0, 5.0]);
        assert_eq!(merged.columns(), 3);
        assert_eq!(merged.label_stats.negative, 2);
        assert_eq!(merged.label_stats.positive, 1);
        assert!(merged.label_stats.unexpected.is_empty());
    }

    #[test]
    fn test_merge_keeps_unmatched_then_drops_them() {
        let schema = ClinicalSchema::default();
        let clinical = vec![
            ClinicalRecord { sample: "S1".to_string(), status: "Positive".to_string() },
            ClinicalRecord { sample: "S9".to_string(), status: "Negative".to_string() },
            ClinicalRecord { sample: "S2".to_string(), status: "Equivocal".to_string() },
        ];
        let matrix = ExpressionMatrix::from_table(&expression_table(), "sample").unwrap();

        let mut merged = merge(&clinical, &matrix, &schema).unwrap();
        assert_eq!(merged.records.len(), 3);
        assert!(merged.records[1].features.iter().all(|v| v.is_nan()));
        assert_eq!(merged.label_stats.unexpected.get("Equivocal"), Some(&1));

        assert_eq!(merged.drop_incomplete().unwrap(), 1);
        let samples: Vec<&str> = merged.records.iter().map(|r| r.sample.as_str()).collect();
        assert_eq!(samples, vec!["S1", "S2"]);
    }

    #[test]
    fn test_drop_incomplete_all_rows_is_error() {
        let mut merged = MergedTable {
            genes: vec!["TP53".to_string()],
            records: vec![SampleRecord {
                sample: "S1".to_string(),
                target: 0,
                features: vec![f64::NAN],
            }],
            label_stats: LabelStats::default(),
        };
        assert!(merged.drop_incomplete().is_err());
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        for &ratio in &[0.1, 0.2, 0.33, 0.5, 0.9] {
            let config = SplitConfig { val_ratio: ratio, seed: Some(7) };
            let mut rng = seeded_rng(7);
            let dataset = split(records(50), &config, &mut rng).unwrap();

            assert_eq!(dataset.total_rows(), 50);
            let expected_val = (ratio * 50.0).ceil() as usize;
            assert_eq!(dataset.val.len(), expected_val);

            let train: HashSet<&str> = dataset.train.iter().map(|r| r.sample.as_str()).collect();
            let val: HashSet<&str> = dataset.val.iter().map(|r| r.sample.as_str()).collect();
            assert!(train.is_disjoint(&val));
            assert_eq!(train.len() + val.len(), 50);
        }
    }

    #[test]
    fn test_split_reproducible_with_seed() {
        let config = SplitConfig { val_ratio: 0.3, seed: Some(11) };
        let a = split(records(20), &config, &mut seeded_rng(11)).unwrap();
        let b = split(records(20), &config, &mut seeded_rng(11)).unwrap();
        assert_eq!(a.val, b.val);
        assert_eq!(a.train, b.train);
    }

    #[test]
    fn test_split_three_rows() {
        let config = SplitConfig { val_ratio: 0.33, seed: Some(1) };
        let dataset = split(records(3), &config, &mut seeded_rng(1)).unwrap();
        assert!(dataset.val.len() == 1 || dataset.val.len() == 2);
        assert_eq!(dataset.total_rows(), 3);
    }

    #[test]
    fn test_split_rejects_bad_ratio_and_tiny_input() {
        let mut rng = seeded_rng(0);
        let bad = SplitConfig { val_ratio: 1.0, seed: None };
        assert!(split(records(10), &bad, &mut rng).is_err());

        let config = SplitConfig::default();
        assert!(split(records(1), &config, &mut rng).is_err());
        assert!(split(Vec::new(), &config, &mut rng).is_err());
    }
}
