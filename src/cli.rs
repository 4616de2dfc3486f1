//! Command-line surface of the remediation tool

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Farm reward remediation calculator and airdrop executor
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "remediation")]
pub struct Cli {
    /// Configuration file path (defaults to ./remediation.toml when present)
    #[arg(short, long, env = "REMEDIATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging for this crate
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute remediations for every configured farm and write the ledger
    Calculate,

    /// Dry run: print owed amounts without writing anything
    Report(ReportArgs),

    /// Send the ledger's remediations on-chain
    Airdrop(AirdropArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Only report this farm (by configured name)
    #[arg(long)]
    pub farm: Option<String>,

    /// Report amounts before removing already-compensated addresses
    #[arg(long)]
    pub no_exclusions: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AirdropArgs {
    /// Ask for an explicit "yes" instead of the timed countdown
    #[arg(long)]
    pub confirm: bool,
}
