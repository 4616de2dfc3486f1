pub mod tzkt;

pub use tzkt::TzktIndexer;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::ledger::models::{DepositorEntry, FarmState};

/// Read-only access to historical chain state
///
/// INVARIANTS:
/// - Both lookups are pinned to the same block height by the caller
/// - Implementations must fail rather than return a truncated key set
#[async_trait]
pub trait ChainIndexer: Send + Sync {
    /// Every depositor entry in the farm's ledger map at `block`
    async fn depositor_entries(&self, map_id: &str, block: u64) -> AppResult<Vec<DepositorEntry>>;

    /// Farm accounting state of `contract` at `block`
    async fn farm_state(&self, contract: &str, block: u64) -> AppResult<FarmState>;
}
