use num_bigint::ParseBigIntError;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Remediation error: {0}")]
    Remediation(#[from] RemediationError),

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Aborted by operator")]
    Aborted,
}

/// Reward reconstruction errors
///
/// Every variant indicates bad snapshot data and aborts the run.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RemediationError {
    #[error("Remediation block {remediation_block} precedes last reward block {last_reward_block}")]
    NegativeElapsedBlocks {
        remediation_block: u64,
        last_reward_block: u64,
    },

    #[error("Farm has zero total stake but {accrued} reward units accrued")]
    ZeroTotalStake { accrued: String },

    #[error("Accumulator for {address} went backwards: projected {projected}, recorded {recorded}")]
    NegativeAccumulatorDelta {
        address: String,
        projected: String,
        recorded: String,
    },
}

/// Chain indexer errors
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Map {map_id} returned {page_size} keys; result may be truncated and pagination is required")]
    PaginationRequired { map_id: String, page_size: usize },

    #[error("Indexer returned status {status} for {url}")]
    BadStatus { status: u16, url: String },

    #[error("Invalid numeric field {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Chain client errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Signing key not found: please set the {0} env variable")]
    MissingCredential(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Node RPC request failed: {0}")]
    Rpc(String),

    #[error("Operation rejected by node: {0}")]
    Rejected(String),

    #[error("Cannot encode {0}")]
    Encoding(String),

    #[error("Node forged different bytes than expected; refusing to sign. local={local} node={remote}")]
    ForgeMismatch { local: String, remote: String },

    #[error("Confirmation failed for {operation}: {message}")]
    Confirmation { operation: String, message: String },
}

/// Ledger / receipt file errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Malformed ledger line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid amount on ledger line {line}: {source}")]
    InvalidAmount {
        line: usize,
        #[source]
        source: ParseBigIntError,
    },
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Indexer(IndexerError::Http(error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
