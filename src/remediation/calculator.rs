use num_bigint::BigUint;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::FarmTarget;
use crate::error::AppResult;
use crate::indexer::ChainIndexer;
use crate::ledger::models::{DropReason, DroppedEntry, RemediationLine};
use crate::ledger::LedgerRepository;
use crate::remediation::engine;
use crate::remediation::filter::{filter_lines, ExclusionSet};
use crate::utils::amount::{self, format_amount};

/// What the calculator does with its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Print owed amounts only
    DryRun,
    /// Print and write the cumulative remediation ledger
    WriteLedger,
}

#[derive(Debug, Clone)]
pub struct CalculatorConfig {
    pub remediation_block: u64,
    pub token_symbol: String,
    pub token_decimals: u32,
}

/// Outcome for one farm
#[derive(Debug, Clone)]
pub struct FarmReport {
    pub farm: FarmTarget,
    pub depositors: usize,
    pub lines: Vec<RemediationLine>,
    pub dropped: Vec<DroppedEntry>,
    pub total_owed: BigUint,
}

impl FarmReport {
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }
}

/// Remediation calculator - drives the reconstruction engine farm by farm
///
/// Farms are processed strictly in the given order, one network call at a
/// time, so log output is deterministic.
pub struct RemediationCalculator {
    config: CalculatorConfig,
    indexer: Arc<dyn ChainIndexer>,
    exclusions: ExclusionSet,
    ledger: LedgerRepository,
}

impl RemediationCalculator {
    pub fn new(
        config: CalculatorConfig,
        indexer: Arc<dyn ChainIndexer>,
        exclusions: ExclusionSet,
        ledger: LedgerRepository,
    ) -> Self {
        Self {
            config,
            indexer,
            exclusions,
            ledger,
        }
    }

    fn format(&self, raw: &BigUint) -> String {
        format_amount(raw, self.config.token_decimals)
    }

    /// Fetch both snapshots for `farm` and compute its filtered remediation lines
    #[instrument(skip(self, farm), fields(farm = %farm.name))]
    pub async fn calculate_farm(&self, farm: &FarmTarget) -> AppResult<FarmReport> {
        let block = self.config.remediation_block;

        info!("🔄 Calculating Remediation...");
        info!("Contract: {}", farm.contract);
        info!("Big Map ID: {}", farm.depositor_map_id);
        info!("Remediation Block: {}", block);

        let entries = self
            .indexer
            .depositor_entries(&farm.depositor_map_id, block)
            .await?;
        let state = self.indexer.farm_state(&farm.contract, block).await?;
        info!("Fetched {} depositor entries and farm storage", entries.len());

        // Zero-stake entries short-circuit before the snapshot is checked
        let mut raw_lines = Vec::with_capacity(entries.len());
        for entry in &entries {
            let owed = engine::compute_owed(&state, entry, block)?;
            raw_lines.push(RemediationLine::new(entry.address.clone(), owed).with_source(farm.contract.clone()));
        }

        let outcome = filter_lines(raw_lines, &self.exclusions);

        info!("Amounts Owed:");
        info!("===================================");
        for line in &outcome.kept {
            info!("{}: {} {}", line.address, self.format(&line.amount_owed), self.config.token_symbol);
        }
        info!("===================================");
        info!("Number Addresses: {}", outcome.kept.len());
        info!(
            "Dropped: {} owed nothing, {} already compensated",
            outcome.dropped_for(DropReason::ZeroOwed),
            outcome.dropped_for(DropReason::AlreadyCompensated)
        );
        info!("Total Owed: {} {}", self.format(&outcome.total_owed), self.config.token_symbol);

        Ok(FarmReport {
            farm: farm.clone(),
            depositors: entries.len(),
            lines: outcome.kept,
            dropped: outcome.dropped,
            total_owed: outcome.total_owed,
        })
    }

    /// Run every farm in order. In `WriteLedger` mode the ledger is truncated
    /// first and each farm's lines are appended as soon as they are computed.
    pub async fn run(&self, farms: &[FarmTarget], mode: ReportMode) -> AppResult<Vec<FarmReport>> {
        if mode == ReportMode::WriteLedger {
            self.ledger.truncate().await?;
        }

        let mut reports = Vec::with_capacity(farms.len());
        for farm in farms {
            let report = self.calculate_farm(farm).await?;
            if mode == ReportMode::WriteLedger {
                self.ledger.append(&report.lines).await?;
            }
            reports.push(report);
        }

        for report in &reports {
            info!(
                "{}: {} depositors, {} remediations, {} owed nothing, {} already compensated",
                report.farm.name,
                report.depositors,
                report.lines.len(),
                report.dropped_for(DropReason::ZeroOwed),
                report.dropped_for(DropReason::AlreadyCompensated)
            );
        }

        let grand_total = amount::sum(reports.iter().map(|r| &r.total_owed));
        let line_count: usize = reports.iter().map(|r| r.lines.len()).sum();
        info!(
            "✅ {} farms, {} remediation lines, {} {} owed in total",
            reports.len(),
            line_count,
            self.format(&grand_total),
            self.config.token_symbol
        );

        if mode == ReportMode::WriteLedger {
            info!("Wrote data to {}", self.ledger.path().display());
        }

        Ok(reports)
    }
}
