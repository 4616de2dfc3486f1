// Airdrop execution - replays the remediation ledger as on-chain transfers
pub mod batching;
pub mod executor;
pub mod preflight;

pub use executor::{AirdropConfig, AirdropExecutor};
pub use preflight::{CountdownGate, PreflightGate, PromptGate};
