use num_bigint::BigUint;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::airdrop::batching::partition_round_robin;
use crate::airdrop::preflight::{PreflightGate, PreflightSummary};
use crate::chain::ChainClient;
use crate::error::AppResult;
use crate::ledger::models::{AirdropRecord, RemediationLine};
use crate::ledger::ReceiptRepository;
use crate::utils::amount;

#[derive(Debug, Clone)]
pub struct AirdropConfig {
    pub token_contract: String,
    pub token_symbol: String,
    pub token_decimals: u32,
    pub batch_size: usize,
    pub confirmations: u32,
}

/// A batch that was not confirmed and needs manual reconciliation
#[derive(Debug, Clone)]
pub struct FailedBatch {
    pub index: usize,
    pub lines: Vec<RemediationLine>,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct AirdropSummary {
    pub completed: Vec<AirdropRecord>,
    pub failed: Vec<FailedBatch>,
}

impl AirdropSummary {
    pub fn total_sent(&self) -> BigUint {
        amount::sum(self.completed.iter().map(|r| &r.amount))
    }
}

/// Batch transfer executor
///
/// INVARIANTS:
/// - Batches are submitted strictly one at a time, each confirmation wait
///   finishing before the next submission
/// - A failed batch is logged and skipped, never retried
/// - Receipt rows are only written for confirmed batches
pub struct AirdropExecutor {
    config: AirdropConfig,
    client: Arc<dyn ChainClient>,
    gate: Arc<dyn PreflightGate>,
    receipt: ReceiptRepository,
}

impl AirdropExecutor {
    pub fn new(
        config: AirdropConfig,
        client: Arc<dyn ChainClient>,
        gate: Arc<dyn PreflightGate>,
        receipt: ReceiptRepository,
    ) -> Self {
        Self {
            config,
            client,
            gate,
            receipt,
        }
    }

    #[instrument(skip(self, lines), fields(run_id = %Uuid::new_v4(), remediations = lines.len()))]
    pub async fn run(&self, lines: Vec<RemediationLine>) -> AppResult<AirdropSummary> {
        let batches = partition_round_robin(&lines, self.config.batch_size);

        let preflight = PreflightSummary {
            signer: self.client.signer_address().to_string(),
            remediations: lines.len(),
            batches: batches.len(),
            total_amount: amount::sum(lines.iter().map(|l| &l.amount_owed)),
            token_symbol: self.config.token_symbol.clone(),
            token_decimals: self.config.token_decimals,
        };

        if batches.is_empty() {
            warn!("⚠️ Ledger is empty, nothing to airdrop");
            self.receipt.write_header().await?;
            return Ok(AirdropSummary::default());
        }

        self.gate.clear(&preflight).await?;
        self.receipt.write_header().await?;

        let mut summary = AirdropSummary::default();

        for (index, batch) in batches.into_iter().enumerate() {
            info!(">> Processing batch {} of {}", index + 1, preflight.batches);

            match self.process_batch(&batch).await {
                Ok(records) => {
                    if let Err(e) = self.receipt.append(&records).await {
                        error!(
                            "❌ Batch {} confirmed but receipt write failed: {}. Records: {}",
                            index,
                            e,
                            serde_json::to_string(&records).unwrap_or_default()
                        );
                        return Err(e);
                    }
                    summary.completed.extend(records);
                }
                Err(e) => {
                    error!("-----------------------------------------------");
                    error!("Unexpected error: {}", e);
                    error!("Error occurred in batch {}", index);
                    error!(
                        "Batch {} dump: {}",
                        index,
                        serde_json::to_string(&batch).unwrap_or_default()
                    );
                    error!("Please verify whether the batch succeeded.");
                    error!("-----------------------------------------------");

                    summary.failed.push(FailedBatch {
                        index,
                        lines: batch,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "✓ Airdropping complete: {} transfers confirmed ({} {}), {} batches failed",
            summary.completed.len(),
            amount::format_amount(&summary.total_sent(), self.config.token_decimals),
            self.config.token_symbol,
            summary.failed.len()
        );
        info!("> Written to {}", self.receipt.path().display());

        Ok(summary)
    }

    /// Submit one batch and wait for its confirmations
    async fn process_batch(&self, batch: &[RemediationLine]) -> AppResult<Vec<AirdropRecord>> {
        let pending = self
            .client
            .submit_transfers(&self.config.token_contract, batch)
            .await?;

        info!(
            ">> Sent in hash {}. Waiting for {} confirmation(s).",
            pending.hash, self.config.confirmations
        );

        let level = self
            .client
            .wait_for_confirmation(&pending, self.config.confirmations)
            .await?;
        info!(">> Confirmed! (included at level {})", level);

        Ok(batch
            .iter()
            .map(|line| AirdropRecord {
                address: line.address.clone(),
                amount: line.amount_owed.clone(),
                operation_reference: pending.hash.clone(),
            })
            .collect())
    }
}
