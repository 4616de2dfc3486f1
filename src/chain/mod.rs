pub mod forge;
pub mod keys;
pub mod tezos;

pub use keys::TezosSigner;
pub use tezos::{TezosClient, TezosConfig};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppResult, ChainError};
use crate::ledger::models::RemediationLine;

/// Handle for an injected, not yet confirmed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Opaque operation reference recorded in the receipt
    pub hash: String,
    /// Head level observed just before injection
    pub submitted_at_level: u64,
}

/// Chain client trait - signs and submits transfer batches
///
/// SECURITY: Every batch shares the signer's counter sequence, so callers
/// must not submit a batch before the previous confirmation wait returns.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Public address of the signing account
    fn signer_address(&self) -> &str;

    /// Submit one multi-transfer operation with a `transfer` call per line
    async fn submit_transfers(&self, token_contract: &str, batch: &[RemediationLine]) -> AppResult<PendingOperation>;

    /// Block until the operation has `confirmations` blocks on top of (and
    /// including) its inclusion block. Returns the inclusion level.
    async fn wait_for_confirmation(&self, operation: &PendingOperation, confirmations: u32) -> AppResult<u64>;
}

/// Load the signing key from the named environment variable
pub fn signer_from_env(var: &str) -> AppResult<TezosSigner> {
    let secret = std::env::var(var).map_err(|_| ChainError::MissingCredential(var.to_string()))?;
    let signer = TezosSigner::from_secret_key(&secret)?;
    debug!("Loaded signer {} ({})", signer.public_key_hash(), signer.public_key());
    Ok(signer)
}
