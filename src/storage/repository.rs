use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::domain::{
    Account, AccountId, Cents, CreateAccountParams, CreateEntryParams, Entry, EntryId,
    IntegrityStats, Transfer, TransferId, TransferParams,
};

use super::{
    LedgerStore, MIGRATION_001_INITIAL, Page, StoreError, TransferFilter, Transactional, queries,
};

/// Ledger store bound to the shared connection pool.
///
/// Every call borrows a pooled connection for the duration of one statement,
/// so calls are individually atomic but never grouped. Use [`Repository::begin`]
/// to get a [`TxRepository`] when several writes must land together.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Build the connection pool described by `config`.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // WAL lets readers proceed while one writer holds the lock; the busy
        // timeout makes concurrent writers queue instead of failing at once.
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("Invalid database url: {}", config.url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!(
            url = %config.url,
            max_connections = config.max_connections,
            "database pool established"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        debug!("migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &DatabaseConfig) -> Result<Self> {
        let repo = Self::connect(config).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction on a pooled connection.
    ///
    /// Fails with [`StoreError::PoolExhausted`] when no connection frees up
    /// within the configured acquire timeout.
    pub async fn begin(&self) -> Result<TxRepository, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(TxRepository { tx })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Ledger store bound to one open transaction.
///
/// Dropping it without calling [`commit`](TxRepository::commit) rolls the
/// transaction back when the connection returns to the pool.
pub struct TxRepository {
    tx: Transaction<'static, Sqlite>,
}

impl TxRepository {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Transactional for TxRepository {
    async fn commit(self) -> Result<(), StoreError> {
        TxRepository::commit(self).await
    }

    async fn rollback(self) -> Result<(), StoreError> {
        TxRepository::rollback(self).await
    }
}

#[async_trait]
impl LedgerStore for Repository {
    async fn create_account(
        &mut self,
        params: &CreateAccountParams,
    ) -> Result<Account, StoreError> {
        queries::create_account(&self.pool, params).await
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        queries::get_account(&self.pool, id).await
    }

    // Outside a transaction there is nothing to hold the row for.
    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        queries::get_account(&self.pool, id).await
    }

    async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, StoreError> {
        queries::list_accounts(&self.pool, page).await
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError> {
        // Read and update under one transaction so the range check holds
        let mut tx = self.pool.begin().await?;
        let account = queries::add_account_balance(&mut tx, id, delta).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        queries::delete_account(&self.pool, id).await
    }

    async fn create_entry(&mut self, params: &CreateEntryParams) -> Result<Entry, StoreError> {
        queries::create_entry(&self.pool, params).await
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        queries::get_entry(&self.pool, id).await
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        queries::list_entries(&self.pool, account_id, page).await
    }

    async fn create_transfer(&mut self, params: &TransferParams) -> Result<Transfer, StoreError> {
        queries::create_transfer(&self.pool, params).await
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        queries::get_transfer(&self.pool, id).await
    }

    async fn list_transfers(
        &mut self,
        filter: TransferFilter,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        queries::list_transfers(&self.pool, filter, page).await
    }

    async fn integrity_stats(&mut self) -> Result<IntegrityStats, StoreError> {
        let mut conn = self.pool.acquire().await?;
        queries::integrity_stats(&mut conn).await
    }
}

#[async_trait]
impl LedgerStore for TxRepository {
    async fn create_account(
        &mut self,
        params: &CreateAccountParams,
    ) -> Result<Account, StoreError> {
        queries::create_account(&mut *self.tx, params).await
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        queries::get_account(&mut *self.tx, id).await
    }

    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        queries::get_account(&mut *self.tx, id).await
    }

    async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, StoreError> {
        queries::list_accounts(&mut *self.tx, page).await
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError> {
        queries::add_account_balance(&mut self.tx, id, delta).await
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        queries::delete_account(&mut *self.tx, id).await
    }

    async fn create_entry(&mut self, params: &CreateEntryParams) -> Result<Entry, StoreError> {
        queries::create_entry(&mut *self.tx, params).await
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        queries::get_entry(&mut *self.tx, id).await
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        queries::list_entries(&mut *self.tx, account_id, page).await
    }

    async fn create_transfer(&mut self, params: &TransferParams) -> Result<Transfer, StoreError> {
        queries::create_transfer(&mut *self.tx, params).await
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        queries::get_transfer(&mut *self.tx, id).await
    }

    async fn list_transfers(
        &mut self,
        filter: TransferFilter,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        queries::list_transfers(&mut *self.tx, filter, page).await
    }

    async fn integrity_stats(&mut self) -> Result<IntegrityStats, StoreError> {
        queries::integrity_stats(&mut self.tx).await
    }
}
