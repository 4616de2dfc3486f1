use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::{AppResult, IndexerError};
use crate::indexer::ChainIndexer;
use crate::ledger::models::{DepositorEntry, FarmState};
use crate::utils::amount::decimal_string;

/// Maximum number of keys a single historical map request returns
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One key of a farm's depositor big map
#[derive(Debug, Clone, Deserialize)]
pub struct BigMapEntry {
    pub id: u64,
    pub active: bool,
    pub hash: String,
    pub key: String,
    pub value: DelegatorValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatorValue {
    #[serde(with = "decimal_string")]
    pub lp_token_balance: BigUint,
    #[serde(with = "decimal_string")]
    pub accumulated_reward_per_share_start: BigUint,
}

impl From<BigMapEntry> for DepositorEntry {
    fn from(entry: BigMapEntry) -> Self {
        DepositorEntry {
            address: entry.key,
            staked_balance: entry.value.lp_token_balance,
            accumulated_reward_per_share_at_deposit: entry.value.accumulated_reward_per_share_start,
        }
    }
}

/// Farm contract storage as the indexer renders it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmStorage {
    pub farm: FarmRecord,
    #[serde(with = "decimal_string")]
    pub farm_lp_token_balance: BigUint,
    #[serde(default)]
    pub delegators: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRecord {
    pub last_block_update: String,
    #[serde(with = "decimal_string")]
    pub accumulated_reward_per_share: BigUint,
    pub planned_rewards: PlannedRewards,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRewards {
    #[serde(with = "decimal_string")]
    pub reward_per_block: BigUint,
}

impl TryFrom<FarmStorage> for FarmState {
    type Error = IndexerError;

    fn try_from(storage: FarmStorage) -> Result<Self, Self::Error> {
        let last_reward_block = storage
            .farm
            .last_block_update
            .trim()
            .parse::<u64>()
            .map_err(|_| IndexerError::InvalidNumber {
                field: "farm.lastBlockUpdate",
                value: storage.farm.last_block_update.clone(),
            })?;

        Ok(FarmState {
            last_reward_block,
            reward_per_block: storage.farm.planned_rewards.reward_per_block,
            accumulated_reward_per_share: storage.farm.accumulated_reward_per_share,
            total_staked_balance: storage.farm_lp_token_balance,
        })
    }
}

/// Fail closed when a page comes back full: the key set may be truncated.
pub fn ensure_not_truncated(map_id: &str, returned: usize, page_size: usize) -> Result<(), IndexerError> {
    if returned >= page_size {
        return Err(IndexerError::PaginationRequired {
            map_id: map_id.to_string(),
            page_size,
        });
    }
    Ok(())
}

/// TzKT REST API client
pub struct TzktIndexer {
    base_url: String,
    page_size: usize,
    client: Client,
}

impl TzktIndexer {
    pub fn new(base_url: impl Into<String>, page_size: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            client: Client::new(),
        }
    }

    pub fn historical_keys_url(&self, map_id: &str, block: u64) -> String {
        format!(
            "{}/v1/bigmaps/{}/historical_keys/{}?limit={}",
            self.base_url, map_id, block, self.page_size
        )
    }

    pub fn storage_url(&self, contract: &str, block: u64) -> String {
        format!(
            "{}/v1/contracts/{}/storage?level={}",
            self.base_url, contract, block
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(IndexerError::BadStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChainIndexer for TzktIndexer {
    #[instrument(skip(self))]
    async fn depositor_entries(&self, map_id: &str, block: u64) -> AppResult<Vec<DepositorEntry>> {
        let url = self.historical_keys_url(map_id, block);
        let entries: Vec<BigMapEntry> = self.get_json(&url).await?;

        ensure_not_truncated(map_id, entries.len(), self.page_size)?;

        info!("Fetched {} map keys from big map {}", entries.len(), map_id);
        Ok(entries.into_iter().map(DepositorEntry::from).collect())
    }

    #[instrument(skip(self))]
    async fn farm_state(&self, contract: &str, block: u64) -> AppResult<FarmState> {
        let url = self.storage_url(contract, block);
        let storage: FarmStorage = self.get_json(&url).await?;

        info!("Fetched contract storage for {}", contract);
        Ok(FarmState::try_from(storage)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORAGE_JSON: &str = r#"{
        "farm": {
            "claimedRewards": { "paid": "12", "unpaid": "3" },
            "plannedRewards": { "totalBlocks": "1051200", "rewardPerBlock": "1000" },
            "lastBlockUpdate": "100",
            "accumulatedRewardPerShare": "0"
        },
        "addresses": {
            "admin": "tz1admin",
            "rewardReserve": "KT1reserve",
            "lpTokenContract": "KT1lp",
            "rewardTokenContract": "KT1reward"
        },
        "delegators": 4,
        "farmLpTokenBalance": "500"
    }"#;

    const KEYS_JSON: &str = r#"[
        {
            "id": 1,
            "active": true,
            "hash": "exprA",
            "key": "tz1QYHEo2phwobtPvcF7mXA1uCDEZ1zcuF7L",
            "value": { "lpTokenBalance": "500", "accumulatedRewardPerShareStart": "0" }
        },
        {
            "id": 2,
            "active": false,
            "hash": "exprB",
            "key": "tz1TRrpXyABLU7RfM1fR5AbFM4g3F71KpKVS",
            "value": { "lpTokenBalance": "0", "accumulatedRewardPerShareStart": "123456789012345678901234567890123456789" }
        }
    ]"#;

    #[test]
    fn test_decodes_farm_storage() {
        let storage: FarmStorage = serde_json::from_str(STORAGE_JSON).unwrap();
        let state = FarmState::try_from(storage).unwrap();

        assert_eq!(state.last_reward_block, 100);
        assert_eq!(state.reward_per_block, BigUint::from(1000u32));
        assert_eq!(state.total_staked_balance, BigUint::from(500u32));
    }

    #[test]
    fn test_rejects_non_numeric_block() {
        let json = STORAGE_JSON.replace(r#""lastBlockUpdate": "100""#, r#""lastBlockUpdate": "soon""#);
        let storage: FarmStorage = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            FarmState::try_from(storage),
            Err(IndexerError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_decodes_map_keys() {
        let keys: Vec<BigMapEntry> = serde_json::from_str(KEYS_JSON).unwrap();
        let entries: Vec<DepositorEntry> = keys.into_iter().map(DepositorEntry::from).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, "tz1QYHEo2phwobtPvcF7mXA1uCDEZ1zcuF7L");
        assert_eq!(entries[0].staked_balance, BigUint::from(500u32));
        assert_eq!(
            entries[1].accumulated_reward_per_share_at_deposit.to_str_radix(10),
            "123456789012345678901234567890123456789"
        );
    }

    #[test]
    fn test_full_page_requires_pagination() {
        assert!(ensure_not_truncated("7262", 999, DEFAULT_PAGE_SIZE).is_ok());
        assert!(matches!(
            ensure_not_truncated("7262", 1000, DEFAULT_PAGE_SIZE),
            Err(IndexerError::PaginationRequired { page_size: 1000, .. })
        ));
    }

    #[test]
    fn test_urls_are_pinned_to_block() {
        let indexer = TzktIndexer::new("https://api.tzkt.io/", DEFAULT_PAGE_SIZE);
        assert_eq!(
            indexer.historical_keys_url("7262", 2568672),
            "https://api.tzkt.io/v1/bigmaps/7262/historical_keys/2568672?limit=1000"
        );
        assert_eq!(
            indexer.storage_url("KT1HDXjPtjv7Y7XtJxrNc5rNjnegTi2ZzNfv", 2568672),
            "https://api.tzkt.io/v1/contracts/KT1HDXjPtjv7Y7XtJxrNc5rNjnegTi2ZzNfv/storage?level=2568672"
        );
    }
}
