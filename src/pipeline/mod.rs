//! End-to-end run: acquire, load, transform, split, persist

use crate::acquire::{Fetcher, HttpFetcher, InputCache, InputPaths, SourceConfig};
use crate::data::loader::TableLoader;
use crate::data::preprocessing::{merge, split, subset_clinical, ExpressionMatrix, LabelStats};
use crate::data::writer::write_partition;
use crate::data::{positive_count, ClinicalSchema, SampleRecord, SplitConfig};
use crate::utils::{format_number, random, validation};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Training partition path, relative to the root
pub const TRAIN_OUTPUT: &str = "output/train/train.csv";

/// Validation partition path, relative to the root
pub const VAL_OUTPUT: &str = "output/val/val.csv";

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory holding `input/` and `output/`
    pub root: PathBuf,
    /// Split ratio and seed
    pub split: SplitConfig,
    /// Remote inputs
    pub sources: SourceConfig,
    /// Table column names and label literals
    pub schema: ClinicalSchema,
    /// Only use inputs already on disk
    pub skip_download: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/opt/ml/processing"),
            split: SplitConfig::default(),
            sources: SourceConfig::default(),
            schema: ClinicalSchema::default(),
            skip_download: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file; absent fields take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Check values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        validation::in_range_exclusive(self.split.val_ratio, 0.0, 1.0, "Validation ratio")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn train_path(&self) -> PathBuf {
        self.root.join(TRAIN_OUTPUT)
    }

    pub fn val_path(&self) -> PathBuf {
        self.root.join(VAL_OUTPUT)
    }
}

/// Shape and class balance of one written partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub positives: usize,
}

impl PartitionReport {
    fn new(path: PathBuf, records: &[SampleRecord], columns: usize) -> Self {
        Self {
            path,
            rows: records.len(),
            columns,
            positives: positive_count(records),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Seed used for the split, replays the run when passed back in
    pub seed: u64,
    pub val_ratio: f64,
    pub inputs: InputPaths,
    pub clinical_rows: usize,
    pub expression_samples: usize,
    pub genes: usize,
    pub merged_rows: usize,
    pub dropped_rows: usize,
    pub labels: LabelStats,
    pub train: PartitionReport,
    pub val: PartitionReport,
}

impl RunReport {
    /// Write the report as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path, json).with_context(|| format!("Failed to write run report {:?}", path))?;
        info!("Run report saved to {:?}", path);
        Ok(())
    }
}

/// Sequential data preparation pipeline
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Option<Box<dyn Fetcher>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            fetcher: None,
        }
    }

    /// Replace the HTTP downloader
    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage in order. Nothing is written to `output/` unless all
    /// earlier stages succeed.
    pub fn run(self) -> Result<RunReport> {
        let Pipeline { config, fetcher } = self;
        config.validate()?;

        let seed = match config.split.seed {
            Some(seed) => seed,
            None => {
                let seed = random::entropy_seed();
                info!("No seed given, drew {} (pass --seed {} to reproduce)", seed, seed);
                seed
            }
        };

        // Acquire
        let fetcher: Box<dyn Fetcher> = match fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpFetcher::new()?),
        };
        let cache = InputCache::new(config.input_dir(), fetcher).offline(config.skip_download);
        let inputs = cache.ensure_all(&config.sources)?;

        // Load
        let loader = TableLoader::new();
        let mut expression = ExpressionMatrix::new(&config.schema.expression_id_column);
        loader
            .read_into(&inputs.expression, &mut expression)
            .context("Failed to load expression table")?;
        info!(
            "Expression matrix: {} genes x {} samples",
            format_number(expression.genes().len()),
            format_number(expression.samples().len())
        );

        let expression_samples = expression.samples().len();

        let clinical_table = loader
            .load(&inputs.clinical)
            .context("Failed to load clinical table")?;

        // Transform
        let clinical = subset_clinical(&clinical_table, &config.schema)?;
        drop(clinical_table);

        let mut merged = merge(&clinical, &expression, &config.schema)?;
        drop(expression);
        let merged_rows = merged.records.len();
        let dropped_rows = merged.drop_incomplete()?;
        let columns = merged.columns();

        // Split
        let mut rng = random::seeded_rng(seed);
        let dataset = split(merged.records, &config.split, &mut rng)?;
        dataset.log_summary();

        // Persist
        let train_path = config.train_path();
        let val_path = config.val_path();
        write_partition(&train_path, &dataset.train)?;
        info!("Training data saved to {:?}", train_path);
        write_partition(&val_path, &dataset.val)?;
        info!("Validation data saved to {:?}", val_path);

        Ok(RunReport {
            seed,
            val_ratio: config.split.val_ratio,
            inputs,
            clinical_rows: clinical.len(),
            expression_samples,
            genes: merged.genes.len(),
            merged_rows,
            dropped_rows,
            labels: merged.label_stats,
            train: PartitionReport::new(train_path, &dataset.train, columns),
            val: PartitionReport::new(val_path, &dataset.val, columns),
        })
    }
}
