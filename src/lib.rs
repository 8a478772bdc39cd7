//! # xenaprep: HER2 training data from TCGA BRCA
//!
//! xenaprep turns the public TCGA BRCA gene expression matrix and clinical
//! matrix from the UCSC Xena hub into labelled training and validation files
//! for a downstream HER2 status classifier.
//!
//! ## Pipeline
//!
//! 1. Fetch both inputs into `<root>/input` unless already present
//! 2. Load the tab-delimited tables
//! 3. Keep sample ID and HER2 status from the clinical table, reorient the
//!    expression matrix to samples x genes, left-join on sample ID and derive
//!    the binary target (`Negative` -> 0, anything else -> 1)
//! 4. Drop rows with missing values and split into training and validation sets
//! 5. Write `<root>/output/train/train.csv` and `<root>/output/val/val.csv`
//!    (target first, no header, no index)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use xenaprep::pipeline::{Pipeline, PipelineConfig};
//!
//! let mut config = PipelineConfig::default();
//! config.root = "/tmp/xena".into();
//! config.split.seed = Some(2026);
//!
//! let report = Pipeline::new(config).run().unwrap();
//! println!("{} training rows", report.train.rows);
//! ```

pub mod acquire;
pub mod cli;
pub mod data;
pub mod pipeline;
pub mod utils;

/// Re-export commonly used types
pub use acquire::{Fetcher, HttpFetcher, InputCache, SourceConfig, SourceFile};
pub use data::{ClinicalSchema, LabelPolicy, SampleRecord, SchemaError, SplitConfig, SplitDataset};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - TCGA BRCA HER2 dataset preparation",
        NAME, VERSION
    )
}
