use super::models::*;
use crate::error::{AppResult, LedgerError};
use num_bigint::BigUint;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const RECEIPT_HEADER: &str = "address, amount, operation hash,";

/// Render one output ledger row: `<address>, <amount>, <source_contract>`
pub fn format_ledger_line(line: &RemediationLine) -> String {
    format!(
        "{}, {}, {}\n",
        line.address,
        line.amount_owed,
        line.source_contract.as_deref().unwrap_or_default()
    )
}

/// Render one receipt row: `<address>, <amount>, <operation_reference>,`
pub fn format_receipt_line(record: &AirdropRecord) -> String {
    format!(
        "{}, {}, {},\n",
        record.address, record.amount, record.operation_reference
    )
}

/// Parse `<address>,<amount>[,<source_contract>]` rows.
///
/// Fields are trimmed. Blank lines (including the trailing one) are
/// skipped; any other line missing an address or amount is rejected.
pub fn parse_ledger(content: &str) -> Result<Vec<RemediationLine>, LedgerError> {
    let mut lines = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let mut components = raw.split(',').map(str::trim);
        let address = components.next().unwrap_or_default();
        let amount = components.next().unwrap_or_default();

        if address.is_empty() || amount.is_empty() {
            return Err(LedgerError::MalformedLine {
                line: line_number,
                content: raw.to_string(),
            });
        }

        let amount_owed = BigUint::from_str(amount).map_err(|source| LedgerError::InvalidAmount {
            line: line_number,
            source,
        })?;

        let source_contract = components
            .next()
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        lines.push(RemediationLine {
            address: address.to_string(),
            amount_owed,
            source_contract,
        });
    }

    Ok(lines)
}

async fn append_to(path: &Path, content: &str) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Append-only remediation ledger shared by every farm in a run
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    path: PathBuf,
}

impl LedgerRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh ledger for this run
    pub async fn truncate(&self) -> AppResult<()> {
        fs::write(&self.path, "").await?;
        Ok(())
    }

    pub async fn append(&self, lines: &[RemediationLine]) -> AppResult<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let content: String = lines.iter().map(format_ledger_line).collect();
        append_to(&self.path, &content).await?;

        info!("Appended {} rows to {}", lines.len(), self.path.display());
        Ok(())
    }

    pub async fn read_all(&self) -> AppResult<Vec<RemediationLine>> {
        let content = fs::read_to_string(&self.path).await?;
        Ok(parse_ledger(&content)?)
    }
}

/// Receipt of confirmed transfers
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    path: PathBuf,
}

impl ReceiptRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite any previous receipt with just the header
    pub async fn write_header(&self) -> AppResult<()> {
        fs::write(&self.path, format!("{}\n", RECEIPT_HEADER)).await?;
        Ok(())
    }

    pub async fn append(&self, records: &[AirdropRecord]) -> AppResult<()> {
        let content: String = records.iter().map(format_receipt_line).collect();
        append_to(&self.path, &content).await
    }
}
