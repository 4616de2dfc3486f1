mod error;
mod airdrop;
mod chain;
mod cli;
mod config;
mod indexer;
mod ledger;
mod remediation;
mod utils;
mod bootstrap;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::remediation::ReportMode;

// Initialize logging and tracing
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info,remediation=debug" } else { "info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!("🚀 Starting farm reward remediation");

    // Load configuration
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Calculate => {
            let calculator = bootstrap::initialize_calculator(&config, true).await?;
            calculator.run(&config.farms, ReportMode::WriteLedger).await?;
        }
        Command::Report(args) => {
            let farms = match &args.farm {
                Some(name) => vec![config
                    .farm(name)
                    .cloned()
                    .with_context(|| format!("no farm named {:?} is configured", name))?],
                None => config.farms.clone(),
            };

            let calculator = bootstrap::initialize_calculator(&config, !args.no_exclusions).await?;
            calculator.run(&farms, ReportMode::DryRun).await?;
        }
        Command::Airdrop(args) => {
            let executor = bootstrap::initialize_executor(&config, args.confirm).await?;

            let ledger = ledger::LedgerRepository::new(&config.ledger_path);
            let lines = ledger
                .read_all()
                .await
                .with_context(|| format!("failed to read ledger {}", config.ledger_path.display()))?;

            let summary = executor.run(lines).await?;
            for batch in &summary.failed {
                warn!(
                    "⚠️  Batch {} ({} transfers) needs manual reconciliation: {}",
                    batch.index,
                    batch.lines.len(),
                    batch.error
                );
            }
        }
    }

    info!("All Done!");
    Ok(())
}
