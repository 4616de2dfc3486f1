use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::amount::decimal_string;

/// Global farm accounting snapshot at the remediation block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmState {
    /// Block height at which the accumulator was last updated
    pub last_reward_block: u64,
    /// Reward-token units minted per block, before mantissa scaling
    pub reward_per_block: BigUint,
    /// Mantissa-scaled running reward per staked unit
    pub accumulated_reward_per_share: BigUint,
    /// Total LP-token balance staked in the farm
    pub total_staked_balance: BigUint,
}

/// One depositor's recorded position at the remediation block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositorEntry {
    pub address: String,
    pub staked_balance: BigUint,
    /// Accumulator value recorded when the position was last touched
    pub accumulated_reward_per_share_at_deposit: BigUint,
}

/// One computed owed amount
///
/// Created by the reconstruction engine, filtered, then persisted
/// append-only. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationLine {
    pub address: String,
    /// Raw token units, unscaled
    #[serde(with = "decimal_string")]
    pub amount_owed: BigUint,
    /// Farm contract the amount was computed from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_contract: Option<String>,
}

impl RemediationLine {
    pub fn new(address: impl Into<String>, amount_owed: BigUint) -> Self {
        Self {
            address: address.into(),
            amount_owed,
            source_contract: None,
        }
    }

    pub fn with_source(mut self, contract: impl Into<String>) -> Self {
        self.source_contract = Some(contract.into());
        self
    }
}

/// Why an entry was left out of the remediation ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Correctly owed nothing at the remediation block
    ZeroOwed,
    /// Already compensated through a separate channel
    AlreadyCompensated,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::ZeroOwed => "zero_owed",
            DropReason::AlreadyCompensated => "already_compensated",
        }
    }
}

/// An entry removed by the ledger filter, with its reason code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedEntry {
    pub address: String,
    #[serde(with = "decimal_string")]
    pub amount_owed: BigUint,
    pub reason: DropReason,
}

/// One confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirdropRecord {
    pub address: String,
    #[serde(with = "decimal_string")]
    pub amount: BigUint,
    /// Opaque operation identifier returned by the chain client
    pub operation_reference: String,
}
