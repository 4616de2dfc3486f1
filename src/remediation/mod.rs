// Remediation calculation: reconstruction engine, ledger filter and the
// per-farm driver shared by the dry-run report and ledger-writing modes
pub mod calculator;
pub mod engine;
pub mod filter;

pub use calculator::{CalculatorConfig, RemediationCalculator, ReportMode};
pub use filter::ExclusionSet;
