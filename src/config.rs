use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::indexer::tzkt::DEFAULT_PAGE_SIZE;
use crate::utils::amount::TOKEN_DECIMALS;

pub const DEFAULT_CONFIG_FILE: &str = "remediation.toml";

/// A farm contract to remediate and the big map holding its depositors
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FarmTarget {
    pub name: String,
    pub contract: String,
    pub depositor_map_id: String,
}

impl FarmTarget {
    pub fn new(name: &str, contract: &str, depositor_map_id: &str) -> Self {
        Self {
            name: name.to_string(),
            contract: contract.to_string(),
            depositor_map_id: depositor_map_id.to_string(),
        }
    }
}

/// Run configuration. Every value is fixed for the duration of a run.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub node_url: String,
    pub indexer_url: String,
    pub remediation_block: u64,
    pub indexer_page_size: usize,
    pub farms: Vec<FarmTarget>,
    pub excluded_addresses: Vec<String>,
    pub exclusion_file: Option<PathBuf>,
    pub token_contract: String,
    pub token_symbol: String,
    pub token_decimals: u32,
    pub batch_size: usize,
    pub confirmations: u32,
    pub preflight_delay_secs: u64,
    pub ledger_path: PathBuf,
    pub receipt_path: PathBuf,
    pub signer_key_env: String,
    pub transfer_gas_limit: u64,
    pub transfer_storage_limit: u64,
    pub transfer_fee_mutez: u64,
    pub confirmation_poll_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: "https://mainnet.api.tez.ie".to_string(),
            indexer_url: "https://api.tzkt.io".to_string(),
            remediation_block: 2_568_672,
            indexer_page_size: DEFAULT_PAGE_SIZE,
            farms: vec![
                FarmTarget::new("kUSD", "KT1HDXjPtjv7Y7XtJxrNc5rNjnegTi2ZzNfv", "7262"),
                FarmTarget::new("QLkUSD", "KT18oxtA5uyhyYXyAVhTa7agJmxHCTjHpiF7", "7263"),
                FarmTarget::new("Youves LP", "KT1VTA694ZHFQPtxg76HzY7gHdvi7idYEYje", "105534"),
            ],
            excluded_addresses: vec![
                "tz1QYHEo2phwobtPvcF7mXA1uCDEZ1zcuF7L".to_string(),
                "tz1TRrpXyABLU7RfM1fR5AbFM4g3F71KpKVS".to_string(),
            ],
            exclusion_file: None,
            token_contract: "KT1JkoE42rrMBP9b2oDhbx6EUr26GcySZMUH".to_string(),
            token_symbol: "KDAO".to_string(),
            token_decimals: TOKEN_DECIMALS,
            batch_size: 167,
            confirmations: 1,
            preflight_delay_secs: 30,
            ledger_path: PathBuf::from("./remediations.csv"),
            receipt_path: PathBuf::from("./completed"),
            signer_key_env: "KDAO_PK".to_string(),
            transfer_gas_limit: 8000,
            transfer_storage_limit: 257,
            transfer_fee_mutez: 1500,
            confirmation_poll_secs: 5,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `REMEDIATION__*` env variables.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_string_lossy().to_string(), true),
            None => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let settings = config::Config::builder()
            .add_source(config::File::new(&file, config::FileFormat::Toml).required(required))
            .add_source(
                config::Environment::with_prefix("REMEDIATION")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("excluded_addresses")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.confirmations == 0 {
            return Err(AppError::Config("confirmations must be at least 1".to_string()));
        }
        if self.farms.is_empty() {
            return Err(AppError::Config("at least one farm must be configured".to_string()));
        }
        if self.indexer_page_size == 0 {
            return Err(AppError::Config("indexer_page_size must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn preflight_delay(&self) -> Duration {
        Duration::from_secs(self.preflight_delay_secs)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.confirmation_poll_secs.max(1))
    }

    pub fn farm(&self, name: &str) -> Option<&FarmTarget> {
        self.farms.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.farms.len(), 3);
        assert_eq!(config.batch_size, 167);
        assert_eq!(config.preflight_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_loads_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remediation.toml");
        std::fs::write(
            &path,
            r#"
remediation_block = 200
batch_size = 50
excluded_addresses = []

[[farms]]
name = "test"
contract = "KT1test"
depositor_map_id = "1"
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.remediation_block, 200);
        assert_eq!(config.batch_size, 50);
        assert!(config.excluded_addresses.is_empty());
        assert_eq!(config.farms, vec![FarmTarget::new("test", "KT1test", "1")]);
        // untouched fields keep their defaults
        assert_eq!(config.token_symbol, "KDAO");
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(Config::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_farm_lookup_ignores_case() {
        let config = Config::default();
        assert_eq!(config.farm("qlkusd").map(|f| f.depositor_map_id.as_str()), Some("7263"));
        assert!(config.farm("unknown").is_none());
    }
}
