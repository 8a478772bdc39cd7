use crate::pipeline::PipelineConfig;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// xenaprep: build HER2 training data from TCGA BRCA expression and clinical tables
#[derive(Parser, Debug)]
#[command(name = "xenaprep")]
#[command(about = "Prepare TCGA BRCA expression data for HER2 status classification")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Fraction of rows held out for validation [default: 0.2]
    #[arg(long, alias = "train_test_split_ratio", value_parser = parse_ratio)]
    pub train_test_split_ratio: Option<f64>,

    /// Root directory holding input/ and output/ [default: /opt/ml/processing]
    #[arg(long, alias = "local_path")]
    pub local_path: Option<PathBuf>,

    /// Random seed for the split (drawn from entropy if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pipeline configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Use only input files already present, never download
    #[arg(long, alias = "skip_download")]
    pub skip_download: bool,
}

impl Cli {
    /// Build the pipeline configuration: config file (or defaults), then flags on top
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(ratio) = self.train_test_split_ratio {
            config.split.val_ratio = ratio;
        }
        if let Some(root) = &self.local_path {
            config.root = root.clone();
        }
        if self.seed.is_some() {
            config.split.seed = self.seed;
        }
        if self.skip_download {
            config.skip_download = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if ratio > 0.0 && ratio < 1.0 {
        Ok(ratio)
    } else {
        Err(format!("ratio must be strictly between 0 and 1, got {}", ratio))
    }
}

/// Drop every argument the CLI does not define, keeping known flags and their values.
///
/// The first element (program name) is always kept.
pub fn retain_known_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let cmd = Cli::command();
    let mut longs: HashMap<String, bool> = HashMap::new();
    let mut shorts: HashMap<char, bool> = HashMap::new();

    for arg in cmd.get_arguments() {
        let takes_value = arg.get_action().takes_values();
        if let Some(long) = arg.get_long() {
            longs.insert(long.to_string(), takes_value);
        }
        for alias in arg.get_all_aliases().unwrap_or_default() {
            longs.insert(alias.to_string(), takes_value);
        }
        if let Some(short) = arg.get_short() {
            shorts.insert(short, takes_value);
        }
    }
    for builtin in ["help", "version"] {
        longs.insert(builtin.to_string(), false);
    }
    shorts.insert('h', false);
    shorts.insert('V', false);

    let mut iter = args.into_iter();
    let mut kept: Vec<String> = iter.next().into_iter().collect();
    let mut dropped = Vec::new();

    while let Some(arg) = iter.next() {
        let takes_value = if let Some(rest) = arg.strip_prefix("--") {
            match rest.split_once('=') {
                Some((name, _)) => longs.get(name).map(|_| false),
                None => longs.get(rest).copied(),
            }
        } else if let Some(rest) = arg.strip_prefix('-') {
            let mut chars = rest.chars();
            match (chars.next(), chars.as_str()) {
                (Some(c), "") => shorts.get(&c).copied(),
                (Some(c), _) => shorts.get(&c).map(|_| false),
                _ => None,
            }
        } else {
            None
        };

        match takes_value {
            Some(takes_value) => {
                kept.push(arg);
                if takes_value {
                    kept.extend(iter.next());
                }
            }
            None => dropped.push(arg),
        }
    }

    if !dropped.is_empty() {
        debug!("Ignoring unrecognized arguments: {:?}", dropped);
    }
    kept
}

/// Parse CLI arguments, ignoring unrecognized ones
pub fn parse_args() -> Cli {
    Cli::parse_from(retain_known_args(std::env::args()))
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
