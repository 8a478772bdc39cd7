use anyhow::{Context, Result};
use tracing::{error, info};
use xenaprep::cli::{parse_args, setup_logging, Cli};
use xenaprep::pipeline::Pipeline;

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", xenaprep::info());

    if let Err(e) = run(cli) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config().context("Invalid configuration")?;

    info!("Root directory: {:?}", config.root);
    info!("Validation ratio: {}", config.split.val_ratio);

    let report = Pipeline::new(config).run()?;

    info!(
        "Done: {} training rows, {} validation rows, {} columns (seed {})",
        report.train.rows, report.val.rows, report.train.columns, report.seed
    );

    if let Some(path) = &cli.summary {
        report.save(path)?;
    }

    Ok(())
}
