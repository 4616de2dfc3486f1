use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    airdrop::{AirdropConfig, AirdropExecutor, CountdownGate, PreflightGate, PromptGate},
    chain::{signer_from_env, ChainClient, TezosClient, TezosConfig},
    config::Config,
    error::AppResult,
    indexer::TzktIndexer,
    ledger::{LedgerRepository, ReceiptRepository},
    remediation::{CalculatorConfig, ExclusionSet, RemediationCalculator},
};

/// Exclusion set from the configured addresses plus the optional file
pub async fn load_exclusions(config: &Config) -> AppResult<ExclusionSet> {
    let mut exclusions = ExclusionSet::new(config.excluded_addresses.iter().cloned());

    if let Some(path) = &config.exclusion_file {
        let from_file = ExclusionSet::load(path).await?;
        info!("Loaded {} excluded addresses from {}", from_file.len(), path.display());
        exclusions.extend(from_file);
    }

    if exclusions.is_empty() {
        warn!("⚠️  No excluded addresses configured");
    } else {
        info!("✅ {} addresses excluded as already compensated", exclusions.len());
    }

    Ok(exclusions)
}

/// `apply_exclusions = false` keeps already-compensated addresses in the
/// output; only the dry-run report offers that.
pub async fn initialize_calculator(config: &Config, apply_exclusions: bool) -> AppResult<RemediationCalculator> {
    info!("Initializing remediation calculator ...");

    let indexer = Arc::new(TzktIndexer::new(&config.indexer_url, config.indexer_page_size));
    info!("✅ Indexer client initialized: {}", config.indexer_url);

    let exclusions = if apply_exclusions {
        load_exclusions(config).await?
    } else {
        warn!("⚠️  Exclusions disabled: already-compensated addresses are reported too");
        ExclusionSet::default()
    };

    Ok(RemediationCalculator::new(
        CalculatorConfig {
            remediation_block: config.remediation_block,
            token_symbol: config.token_symbol.clone(),
            token_decimals: config.token_decimals,
        },
        indexer,
        exclusions,
        LedgerRepository::new(&config.ledger_path),
    ))
}

pub async fn initialize_executor(config: &Config, confirm: bool) -> AppResult<AirdropExecutor> {
    info!("Initializing airdrop executor ...");

    // Missing credential is fatal
    let signer = signer_from_env(&config.signer_key_env)?;

    let client: Arc<dyn ChainClient> = Arc::new(TezosClient::new(
        TezosConfig {
            node_url: config.node_url.clone(),
            gas_limit: config.transfer_gas_limit,
            storage_limit: config.transfer_storage_limit,
            fee_mutez: config.transfer_fee_mutez,
            poll_interval: config.confirmation_poll_interval(),
        },
        signer,
    ));
    info!("✅ Tezos client initialized for {} ({})", client.signer_address(), config.node_url);

    let gate: Arc<dyn PreflightGate> = if confirm {
        Arc::new(PromptGate)
    } else {
        Arc::new(CountdownGate::new(config.preflight_delay()))
    };

    Ok(AirdropExecutor::new(
        AirdropConfig {
            token_contract: config.token_contract.clone(),
            token_symbol: config.token_symbol.clone(),
            token_decimals: config.token_decimals,
            batch_size: config.batch_size,
            confirmations: config.confirmations,
        },
        client,
        gate,
        ReceiptRepository::new(&config.receipt_path),
    ))
}
