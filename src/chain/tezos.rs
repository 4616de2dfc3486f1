use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, instrument};

use crate::chain::forge;
use crate::chain::keys::TezosSigner;
use crate::chain::{ChainClient, PendingOperation};
use crate::error::{AppResult, ChainError};
use crate::ledger::models::RemediationLine;

/// Blocks after which an unincluded operation's branch has expired
pub const OPERATION_TTL_BLOCKS: u64 = 120;

/// Validation pass holding manager operations
const MANAGER_OPERATIONS_PASS: u8 = 3;

#[derive(Debug, Clone)]
pub struct TezosConfig {
    pub node_url: String,
    pub gas_limit: u64,
    pub storage_limit: u64,
    pub fee_mutez: u64,
    pub poll_interval: Duration,
}

impl Default for TezosConfig {
    fn default() -> Self {
        Self {
            node_url: "https://mainnet.api.tez.ie".to_string(),
            gas_limit: 8000,
            storage_limit: 257,
            fee_mutez: 1500,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// FA1.2 `transfer(from, to, value)` parameter in Micheline JSON
pub fn fa12_transfer_parameters(from: &str, to: &str, value: &BigUint) -> Value {
    json!({
        "entrypoint": TransferContent::ENTRYPOINT,
        "value": {
            "prim": "Pair",
            "args": [
                { "string": from },
                {
                    "prim": "Pair",
                    "args": [
                        { "string": to },
                        { "int": value.to_str_radix(10) }
                    ]
                }
            ]
        }
    })
}

/// One FA1.2 `transfer` call as a manager operation content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferContent {
    pub source: String,
    pub fee: u64,
    pub counter: u64,
    pub gas_limit: u64,
    pub storage_limit: u64,
    /// Token contract
    pub destination: String,
    /// Recipient of the tokens
    pub to: String,
    pub value: BigUint,
}

impl TransferContent {
    pub const ENTRYPOINT: &'static str = "transfer";

    /// Node RPC JSON form
    pub fn to_json(&self) -> Value {
        json!({
            "kind": "transaction",
            "source": self.source,
            "fee": self.fee.to_string(),
            "counter": self.counter.to_string(),
            "gas_limit": self.gas_limit.to_string(),
            "storage_limit": self.storage_limit.to_string(),
            "amount": "0",
            "destination": self.destination,
            "parameters": fa12_transfer_parameters(&self.source, &self.to, &self.value),
        })
    }
}

/// Where a submitted operation stands after looking at the chain head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    /// Included at this level with enough blocks on top
    Confirmed(u64),
    /// Never included and its branch is too old to ever be
    Expired,
}

/// Decide confirmation from the inclusion level (if found) and the head.
///
/// The inclusion block counts as the first confirmation, so the operation
/// is confirmed once `head - included_at + 1 >= confirmations`.
pub fn confirmation_status(
    included_at: Option<u64>,
    head: u64,
    submitted_at_level: u64,
    confirmations: u32,
) -> ConfirmationStatus {
    match included_at {
        Some(level) if head + 1 >= level + u64::from(confirmations) => ConfirmationStatus::Confirmed(level),
        Some(_) => ConfirmationStatus::Pending,
        None if head > submitted_at_level + OPERATION_TTL_BLOCKS => ConfirmationStatus::Expired,
        None => ConfirmationStatus::Pending,
    }
}

/// Tezos node RPC client submitting FA1.2 transfer batches
pub struct TezosClient {
    config: TezosConfig,
    signer: TezosSigner,
    client: Client,
}

impl TezosClient {
    pub fn new(config: TezosConfig, signer: TezosSigner) -> Self {
        Self {
            config: TezosConfig {
                node_url: config.node_url.trim_end_matches('/').to_string(),
                ..config
            },
            signer,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.node_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("GET {} failed: {}", url, e)))?;

        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> AppResult<T> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("POST {} failed: {}", url, e)))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChainError::Rejected(format!("{}: {}", status, error_text)).into());
        }

        Ok(response
            .json::<T>()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to parse response: {}", e)))?)
    }

    async fn head_level(&self) -> AppResult<u64> {
        let header: Value = self.get("/chains/main/blocks/head/header").await?;
        header["level"]
            .as_u64()
            .ok_or_else(|| ChainError::Rpc("No level in block header".to_string()).into())
    }

    async fn block_contains(&self, level: u64, operation_hash: &str) -> AppResult<bool> {
        let hashes: Vec<String> = self
            .get(&format!(
                "/chains/main/blocks/{}/operation_hashes/{}",
                level, MANAGER_OPERATIONS_PASS
            ))
            .await?;
        Ok(hashes.iter().any(|h| h == operation_hash))
    }

    async fn next_counter(&self) -> AppResult<u64> {
        let counter: String = self
            .get(&format!(
                "/chains/main/blocks/head/context/contracts/{}/counter",
                self.signer.public_key_hash()
            ))
            .await?;

        let current = counter
            .parse::<u64>()
            .map_err(|_| ChainError::Rpc(format!("Invalid counter: {}", counter)))?;
        Ok(current + 1)
    }

    /// One transaction content per line, with consecutive counters
    pub fn build_contents(
        &self,
        token_contract: &str,
        batch: &[RemediationLine],
        first_counter: u64,
    ) -> Vec<TransferContent> {
        let source = self.signer.public_key_hash();

        batch
            .iter()
            .enumerate()
            .map(|(i, line)| TransferContent {
                source: source.to_string(),
                fee: self.config.fee_mutez,
                counter: first_counter + i as u64,
                gas_limit: self.config.gas_limit,
                storage_limit: self.config.storage_limit,
                destination: token_contract.to_string(),
                to: line.address.clone(),
                value: line.amount_owed.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ChainClient for TezosClient {
    fn signer_address(&self) -> &str {
        self.signer.public_key_hash()
    }

    #[instrument(skip(self, batch), fields(transfers = batch.len()))]
    async fn submit_transfers(&self, token_contract: &str, batch: &[RemediationLine]) -> AppResult<PendingOperation> {
        let submitted_at_level = self.head_level().await?;
        let branch: String = self.get("/chains/main/blocks/head/hash").await?;
        let first_counter = self.next_counter().await?;

        let contents = self.build_contents(token_contract, batch, first_counter);
        let forged = forge::forge_operation(&branch, &contents)?;

        let contents_json: Vec<Value> = contents.iter().map(TransferContent::to_json).collect();
        let node_forged: String = self
            .post(
                "/chains/main/blocks/head/helpers/forge/operations",
                &json!({ "branch": branch, "contents": contents_json }),
            )
            .await?;
        forge::ensure_matches(&forged, &node_forged)?;
        debug!("Node forge matches local encoding ({} bytes)", forged.len());

        let signature = self.signer.sign_operation(&forged);
        let signed = format!("{}{}", hex::encode(&forged), hex::encode(signature));

        let hash: String = self.post("/injection/operation?chain=main", &json!(signed)).await?;
        info!("Injected operation {} at level {}", hash, submitted_at_level);

        Ok(PendingOperation {
            hash,
            submitted_at_level,
        })
    }

    #[instrument(skip(self, operation), fields(operation = %operation.hash))]
    async fn wait_for_confirmation(&self, operation: &PendingOperation, confirmations: u32) -> AppResult<u64> {
        let mut scan_from = operation.submitted_at_level + 1;
        let mut included_at: Option<u64> = None;

        loop {
            let head = self.head_level().await?;

            while included_at.is_none() && scan_from <= head {
                if self.block_contains(scan_from, &operation.hash).await? {
                    debug!("Operation {} included at level {}", operation.hash, scan_from);
                    included_at = Some(scan_from);
                }
                scan_from += 1;
            }

            match confirmation_status(included_at, head, operation.submitted_at_level, confirmations) {
                ConfirmationStatus::Confirmed(level) => return Ok(level),
                ConfirmationStatus::Expired => {
                    return Err(ChainError::Confirmation {
                        operation: operation.hash.clone(),
                        message: format!("not included within {} blocks", OPERATION_TTL_BLOCKS),
                    }
                    .into());
                }
                ConfirmationStatus::Pending => {}
            }

            time::sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn client() -> TezosClient {
        TezosClient::new(
            TezosConfig {
                node_url: "http://localhost:8732/".to_string(),
                ..TezosConfig::default()
            },
            TezosSigner::from_seed([1u8; 32]),
        )
    }

    #[test]
    fn test_transfer_parameters_are_fa12_pairs() {
        let value = BigUint::from_str("123456789012345678901234").unwrap();
        let params = fa12_transfer_parameters("tz1from", "tz1dest", &value);

        assert_eq!(params["entrypoint"], "transfer");
        assert_eq!(params["value"]["args"][0]["string"], "tz1from");
        assert_eq!(params["value"]["args"][1]["args"][0]["string"], "tz1dest");
        assert_eq!(params["value"]["args"][1]["args"][1]["int"], "123456789012345678901234");
    }

    #[test]
    fn test_build_contents_uses_consecutive_counters() {
        let client = client();
        let batch = vec![
            RemediationLine::new("tz1a", BigUint::from(1u32)),
            RemediationLine::new("tz1b", BigUint::from(2u32)),
            RemediationLine::new("tz1c", BigUint::from(3u32)),
        ];

        let contents = client.build_contents("KT1token", &batch, 41);

        assert_eq!(contents.len(), 3);
        let counters: Vec<u64> = contents.iter().map(|c| c.counter).collect();
        assert_eq!(counters, vec![41, 42, 43]);
        assert_eq!(contents[1].to, "tz1b");
        assert_eq!(contents[2].value, BigUint::from(3u32));

        let json = contents[0].to_json();
        assert_eq!(json["counter"], "41");
        assert_eq!(json["destination"], "KT1token");
        assert_eq!(json["gas_limit"], "8000");
        assert_eq!(json["amount"], "0");
        assert_eq!(json["source"], client.signer_address());
        assert_eq!(json["parameters"]["value"]["args"][1]["args"][0]["string"], "tz1a");
    }

    #[test]
    fn test_single_confirmation_is_the_inclusion_block() {
        assert_eq!(confirmation_status(None, 100, 100, 1), ConfirmationStatus::Pending);
        assert_eq!(confirmation_status(Some(101), 101, 100, 1), ConfirmationStatus::Confirmed(101));
        assert_eq!(confirmation_status(Some(101), 105, 100, 1), ConfirmationStatus::Confirmed(101));
    }

    #[test]
    fn test_waits_for_blocks_on_top_of_inclusion() {
        assert_eq!(confirmation_status(Some(101), 101, 100, 3), ConfirmationStatus::Pending);
        assert_eq!(confirmation_status(Some(101), 102, 100, 3), ConfirmationStatus::Pending);
        assert_eq!(confirmation_status(Some(101), 103, 100, 3), ConfirmationStatus::Confirmed(101));
    }

    #[test]
    fn test_unincluded_operation_expires_after_ttl() {
        let submitted = 100;
        let last_valid = submitted + OPERATION_TTL_BLOCKS;

        assert_eq!(confirmation_status(None, last_valid, submitted, 1), ConfirmationStatus::Pending);
        assert_eq!(confirmation_status(None, last_valid + 1, submitted, 1), ConfirmationStatus::Expired);

        // inclusion found late still counts
        assert_eq!(
            confirmation_status(Some(last_valid), last_valid + 1, submitted, 1),
            ConfirmationStatus::Confirmed(last_valid)
        );
    }

    #[test]
    fn test_node_url_is_normalised() {
        assert_eq!(client().url("/injection/operation"), "http://localhost:8732/injection/operation");
    }
}
