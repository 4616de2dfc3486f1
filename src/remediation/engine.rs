//! Reward reconstruction engine.
//!
//! Recomputes what a depositor was owed at the remediation block using the
//! farm contract's own accumulator update, with integer floor division at
//! each step. No floating point touches any quantity here.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::RemediationError;
use crate::ledger::models::{DepositorEntry, FarmState};

/// Scaling constant applied to the per-share accumulator
pub const MANTISSA_DECIMALS: u32 = 36;

pub fn mantissa() -> BigUint {
    BigUint::from(10u32).pow(MANTISSA_DECIMALS)
}

/// Accumulator value the farm should have reached at `remediation_block`
/// had it been updated then.
///
/// `accumulated + floor(elapsed * reward_per_block * mantissa / total_staked)`
pub fn projected_accumulator(
    farm: &FarmState,
    remediation_block: u64,
) -> Result<BigUint, RemediationError> {
    if remediation_block < farm.last_reward_block {
        return Err(RemediationError::NegativeElapsedBlocks {
            remediation_block,
            last_reward_block: farm.last_reward_block,
        });
    }

    let elapsed_blocks = BigUint::from(remediation_block - farm.last_reward_block);
    let accrued_reward = elapsed_blocks * &farm.reward_per_block;

    if accrued_reward.is_zero() {
        return Ok(farm.accumulated_reward_per_share.clone());
    }

    if farm.total_staked_balance.is_zero() {
        return Err(RemediationError::ZeroTotalStake {
            accrued: accrued_reward.to_str_radix(10),
        });
    }

    let increment = accrued_reward * mantissa() / &farm.total_staked_balance;
    Ok(&farm.accumulated_reward_per_share + increment)
}

/// Owed amount for one depositor given an already projected accumulator
pub fn owed_from_accumulator(
    projected: &BigUint,
    entry: &DepositorEntry,
) -> Result<BigUint, RemediationError> {
    if entry.staked_balance.is_zero() {
        return Ok(BigUint::zero());
    }

    if projected < &entry.accumulated_reward_per_share_at_deposit {
        return Err(RemediationError::NegativeAccumulatorDelta {
            address: entry.address.clone(),
            projected: projected.to_str_radix(10),
            recorded: entry
                .accumulated_reward_per_share_at_deposit
                .to_str_radix(10),
        });
    }

    let delta = projected - &entry.accumulated_reward_per_share_at_deposit;
    Ok(delta * &entry.staked_balance / mantissa())
}

/// Exact amount owed to `entry` as of `remediation_block`.
///
/// Zero-stake depositors short-circuit to zero before the farm snapshot is
/// looked at.
pub fn compute_owed(
    farm: &FarmState,
    entry: &DepositorEntry,
    remediation_block: u64,
) -> Result<BigUint, RemediationError> {
    if entry.staked_balance.is_zero() {
        return Ok(BigUint::zero());
    }

    let projected = projected_accumulator(farm, remediation_block)?;
    owed_from_accumulator(&projected, entry)
}
