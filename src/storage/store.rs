use async_trait::async_trait;

use crate::domain::{
    Account, AccountId, Cents, CreateAccountParams, CreateEntryParams, Entry, EntryId,
    IntegrityStats, Transfer, TransferId, TransferParams,
};

use super::StoreError;

/// Limit/offset pagination, ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Filter for querying transfers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
}

/// Single-row access to the ledger tables.
///
/// Implemented by [`Repository`](super::Repository), which runs every call on
/// a pooled connection, and by [`TxRepository`](super::TxRepository), which
/// runs every call inside the transaction it owns. Callers that must not care
/// which one they hold take `&mut dyn LedgerStore` or a generic `S: LedgerStore`.
#[async_trait]
pub trait LedgerStore: Send {
    async fn create_account(&mut self, params: &CreateAccountParams)
    -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// Read an account with the intent to modify it in the same transaction.
    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError>;

    async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, StoreError>;

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError>;

    async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError>;

    async fn create_entry(&mut self, params: &CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError>;

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError>;

    async fn create_transfer(&mut self, params: &TransferParams) -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError>;

    async fn list_transfers(
        &mut self,
        filter: TransferFilter,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError>;

    async fn integrity_stats(&mut self) -> Result<IntegrityStats, StoreError>;
}

/// A transaction handle that can be finished exactly once.
#[async_trait]
pub trait Transactional: Send + Sized {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
