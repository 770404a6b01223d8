use serde::Serialize;

use super::{AccountId, Cents, Entry};

/// True when a debit/credit pair cancels out exactly.
pub fn entries_balance(from_entry: &Entry, to_entry: &Entry) -> bool {
    from_entry.amount.checked_add(to_entry.amount) == Some(0)
}

/// An account whose entries disagree with the transfers that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountMismatch {
    pub account_id: AccountId,
    /// Sum of the account's entries
    pub entry_sum: Cents,
    /// Incoming minus outgoing transfer amounts
    pub transfer_flow: Cents,
}

/// An account whose balance moved by a different amount than its entries.
/// For a consistent ledger `balance - opening balance` equals the entry sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    /// Current balance minus opening balance
    pub balance_change: Cents,
    pub entry_sum: Cents,
}

/// Raw counters gathered from storage for integrity verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub transfer_count: i64,
    pub entry_count: i64,
    pub invalid_amounts: i64,
    pub self_transfers: i64,
    pub entry_sum: Cents,
    pub mismatched_accounts: Vec<AccountMismatch>,
    pub drifted_accounts: Vec<BalanceDrift>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IntegrityIssue {
    InvalidAmounts(i64),
    SelfTransfers(i64),
    EntryCountMismatch { transfers: i64, entries: i64 },
    UnbalancedLedger(Cents),
    AccountMismatch(AccountMismatch),
    BalanceDrift(BalanceDrift),
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::InvalidAmounts(n) => {
                write!(f, "{} transfer(s) with a non-positive amount", n)
            }
            IntegrityIssue::SelfTransfers(n) => {
                write!(f, "{} transfer(s) from an account to itself", n)
            }
            IntegrityIssue::EntryCountMismatch { transfers, entries } => write!(
                f,
                "{} entries recorded for {} transfers (expected {})",
                entries,
                transfers,
                transfers * 2
            ),
            IntegrityIssue::UnbalancedLedger(sum) => {
                write!(f, "entries sum to {} instead of zero", sum)
            }
            IntegrityIssue::AccountMismatch(m) => write!(
                f,
                "account {}: entries sum to {} but transfers move {}",
                m.account_id, m.entry_sum, m.transfer_flow
            ),
            IntegrityIssue::BalanceDrift(d) => write!(
                f,
                "account {}: balance moved by {} but entries sum to {}",
                d.account_id, d.balance_change, d.entry_sum
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub stats: IntegrityStats,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(stats: IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.invalid_amounts > 0 {
        issues.push(IntegrityIssue::InvalidAmounts(stats.invalid_amounts));
    }
    if stats.self_transfers > 0 {
        issues.push(IntegrityIssue::SelfTransfers(stats.self_transfers));
    }
    if stats.entry_count != stats.transfer_count * 2 {
        issues.push(IntegrityIssue::EntryCountMismatch {
            transfers: stats.transfer_count,
            entries: stats.entry_count,
        });
    }
    if stats.entry_sum != 0 {
        issues.push(IntegrityIssue::UnbalancedLedger(stats.entry_sum));
    }
    issues.extend(
        stats
            .mismatched_accounts
            .iter()
            .cloned()
            .map(IntegrityIssue::AccountMismatch),
    );
    issues.extend(
        stats
            .drifted_accounts
            .iter()
            .cloned()
            .map(IntegrityIssue::BalanceDrift),
    );

    IntegrityReport { stats, issues }
}
