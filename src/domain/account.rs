use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, format_cents};

pub type AccountId = i64;

/// A customer account. The balance is only ever moved by ledger entries;
/// it is written directly exactly once, when the account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Current balance in minor units (may be negative)
    pub balance: Cents,
    /// Currency code, e.g. "EUR"
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for opening a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: Cents,
    pub currency: String,
}

impl CreateAccountParams {
    pub fn new(owner: impl Into<String>, balance: Cents, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {} {}",
            self.id,
            self.owner,
            format_cents(self.balance),
            self.currency
        )
    }
}
