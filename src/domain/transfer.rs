use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents, CreateEntryParams};

pub type TransferId = i64;

/// A transfer represents an atomic movement of money from one account to another.
/// Transfers are immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Amount in minor units (always positive)
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// Input of the transfer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
}

/// A signed delta to apply to one account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub delta: Cents,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Reject requests that can never become a valid transfer.
    pub fn validate(&self) -> Result<(), InvalidTransfer> {
        if self.amount <= 0 {
            return Err(InvalidTransfer::NonPositiveAmount(self.amount));
        }
        if self.from_account_id == self.to_account_id {
            return Err(InvalidTransfer::SameAccount(self.from_account_id));
        }
        Ok(())
    }

    pub fn debit_entry(&self) -> CreateEntryParams {
        CreateEntryParams {
            account_id: self.from_account_id,
            amount: -self.amount,
        }
    }

    pub fn credit_entry(&self) -> CreateEntryParams {
        CreateEntryParams {
            account_id: self.to_account_id,
            amount: self.amount,
        }
    }

    /// Balance deltas in the order they must be applied: ascending account id,
    /// whatever the direction of the transfer. Two transfers touching the same
    /// pair of accounts therefore always lock rows in the same order.
    pub fn balance_updates(&self) -> [BalanceUpdate; 2] {
        let debit = BalanceUpdate {
            account_id: self.from_account_id,
            delta: -self.amount,
        };
        let credit = BalanceUpdate {
            account_id: self.to_account_id,
            delta: self.amount,
        };
        if debit.account_id < credit.account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTransfer {
    NonPositiveAmount(Cents),
    SameAccount(AccountId),
}

impl std::fmt::Display for InvalidTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidTransfer::NonPositiveAmount(amount) => {
                write!(f, "transfer amount must be positive, got {}", amount)
            }
            InvalidTransfer::SameAccount(id) => {
                write!(f, "cannot transfer from account {} to itself", id)
            }
        }
    }
}

impl std::error::Error for InvalidTransfer {}
