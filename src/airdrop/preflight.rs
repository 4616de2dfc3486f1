// Pre-flight gate - the operator's last chance to abort
//
// The airdrop is destructive and not resumable. Before the first batch is
// submitted the computed totals are printed and the run pauses:
// - CountdownGate: timed countdown, abort with CTRL+C
// - PromptGate: explicit "yes" on stdin, anything else aborts

use async_trait::async_trait;
use num_bigint::BigUint;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::amount::format_amount;

/// What the operator is asked to approve
#[derive(Debug, Clone)]
pub struct PreflightSummary {
    pub signer: String,
    pub remediations: usize,
    pub batches: usize,
    pub total_amount: BigUint,
    pub token_symbol: String,
    pub token_decimals: u32,
}

impl PreflightSummary {
    pub fn log(&self) {
        info!("Sending from address {}", self.signer);
        info!("Found {} remediations in {} batches", self.remediations, self.batches);
        info!(
            "Total Amount: {} {}",
            format_amount(&self.total_amount, self.token_decimals),
            self.token_symbol
        );
    }
}

#[async_trait]
pub trait PreflightGate: Send + Sync {
    /// Return `Ok(())` to proceed, `Err(AppError::Aborted)` to stop
    async fn clear(&self, summary: &PreflightSummary) -> AppResult<()>;
}

/// Interval between countdown log lines
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Sleep for a fixed delay, logging the remaining time
pub struct CountdownGate {
    delay: Duration,
}

impl CountdownGate {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PreflightGate for CountdownGate {
    async fn clear(&self, summary: &PreflightSummary) -> AppResult<()> {
        summary.log();
        warn!(
            "⏳ Sleeping for {}s before starting the Airdrop process...",
            self.delay.as_secs()
        );
        warn!("!!! If the numbers above do not look correct, CTRL+C this process now !!!");

        let mut remaining = self.delay;
        while !remaining.is_zero() {
            let step = remaining.min(COUNTDOWN_TICK);
            time::sleep(step).await;
            remaining -= step;
            if !remaining.is_zero() {
                info!("{}s remaining", remaining.as_secs());
            }
        }

        Ok(())
    }
}

/// Require the operator to type `yes`
pub struct PromptGate;

/// Only an exact (case-insensitive) "yes" proceeds
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

#[async_trait]
impl PreflightGate for PromptGate {
    async fn clear(&self, summary: &PreflightSummary) -> AppResult<()> {
        summary.log();
        warn!("Type 'yes' to start the airdrop, anything else aborts:");

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;

        if is_affirmative(&answer) {
            Ok(())
        } else {
            warn!("Airdrop aborted by operator");
            Err(AppError::Aborted)
        }
    }
}
