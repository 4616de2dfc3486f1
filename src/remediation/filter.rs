use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::AppResult;
use crate::ledger::models::{DropReason, DroppedEntry, RemediationLine};
use crate::utils::amount;

/// Addresses already compensated through a separate channel
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    addresses: HashSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses
                .into_iter()
                .map(|a| a.into().trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Load one address per line. Blank lines and `#` comments are ignored.
    pub async fn load(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(|line| line.split('#').next().unwrap_or_default().trim())
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn extend(&mut self, other: ExclusionSet) {
        self.addresses.extend(other.addresses);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Result of filtering one farm's raw owed amounts
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Eligible lines, in input order
    pub kept: Vec<RemediationLine>,
    pub dropped: Vec<DroppedEntry>,
    /// Diagnostic sum of `kept`; not used downstream
    pub total_owed: BigUint,
}

impl FilterOutcome {
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }
}

/// Drop zero-owed and already-compensated entries, keeping input order.
///
/// A zero amount is reported as `ZeroOwed` even if the address is also
/// excluded. No deduplication is performed.
pub fn filter_lines(lines: Vec<RemediationLine>, exclusions: &ExclusionSet) -> FilterOutcome {
    let mut kept = Vec::with_capacity(lines.len());
    let mut dropped = Vec::new();

    for line in lines {
        let reason = if line.amount_owed.is_zero() {
            Some(DropReason::ZeroOwed)
        } else if exclusions.contains(&line.address) {
            Some(DropReason::AlreadyCompensated)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!("Dropping {} ({})", line.address, reason);
                dropped.push(DroppedEntry {
                    address: line.address,
                    amount_owed: line.amount_owed,
                    reason,
                });
            }
            None => kept.push(line),
        }
    }

    let total_owed = amount::sum(kept.iter().map(|l| &l.amount_owed));

    FilterOutcome {
        kept,
        dropped,
        total_owed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(address: &str, amount: u64) -> RemediationLine {
        RemediationLine::new(address, BigUint::from(amount))
    }

    fn raw_lines() -> Vec<RemediationLine> {
        vec![
            line("tz1a", 10),
            line("tz1b", 0),
            line("tz1claimed", 25),
            line("tz1c", 5),
            line("tz1a", 7),
        ]
    }

    #[test]
    fn test_filter_drops_zero_and_excluded() {
        let exclusions = ExclusionSet::new(["tz1claimed"]);
        let outcome = filter_lines(raw_lines(), &exclusions);

        let kept: Vec<&str> = outcome.kept.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(kept, vec!["tz1a", "tz1c", "tz1a"]);
        assert_eq!(outcome.total_owed, BigUint::from(22u32));

        assert_eq!(outcome.dropped_for(DropReason::ZeroOwed), 1);
        assert_eq!(outcome.dropped_for(DropReason::AlreadyCompensated), 1);
        assert_eq!(outcome.dropped[1].address, "tz1claimed");
    }

    #[test]
    fn test_filter_is_idempotent() {
        let exclusions = ExclusionSet::new(["tz1claimed"]);
        let once = filter_lines(raw_lines(), &exclusions);
        let twice = filter_lines(once.kept.clone(), &exclusions);

        assert_eq!(once.kept, twice.kept);
        assert_eq!(once.total_owed, twice.total_owed);
        assert!(twice.dropped.is_empty());
    }

    #[test]
    fn test_zero_amount_wins_over_exclusion() {
        let exclusions = ExclusionSet::new(["tz1b"]);
        let outcome = filter_lines(raw_lines(), &exclusions);
        assert_eq!(outcome.dropped[0].reason, DropReason::ZeroOwed);
    }

    #[test]
    fn test_exclusion_set_parse() {
        let set = ExclusionSet::parse(
            "# already paid manually\ntz1QYHEo2phwobtPvcF7mXA1uCDEZ1zcuF7L\n\n  tz1TRrpXyABLU7RfM1fR5AbFM4g3F71KpKVS  # second\n",
        );

        assert_eq!(set.len(), 2);
        assert!(set.contains("tz1QYHEo2phwobtPvcF7mXA1uCDEZ1zcuF7L"));
        assert!(set.contains("tz1TRrpXyABLU7RfM1fR5AbFM4g3F71KpKVS"));
    }

    #[tokio::test]
    async fn test_exclusion_set_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claimed.txt");
        tokio::fs::write(&path, "tz1one\ntz1two\n").await.unwrap();

        let set = ExclusionSet::load(&path).await.unwrap();
        assert!(set.contains("tz1one"));
        assert!(set.contains("tz1two"));
        assert!(!set.contains("tz1three"));
    }
}
