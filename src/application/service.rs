use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::domain::{
    Account, AccountId, Cents, CreateAccountParams, Entry, EntryId, IntegrityReport, Transfer,
    TransferId, TransferParams, build_integrity_report, entries_balance,
};
use crate::storage::{LedgerStore, Page, Repository, TransferFilter};

use super::{AppError, TransactionManager};

/// Everything a committed transfer touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Application service providing the ledger operations.
/// This is the primary interface for any client; it is cheap to clone and
/// safe to share between concurrent callers.
#[derive(Clone)]
pub struct TransferService {
    repo: Repository,
    transactions: TransactionManager,
}

impl TransferService {
    /// Create a new service on top of the given repository.
    pub fn new(repo: Repository, config: &DatabaseConfig) -> Self {
        let transactions =
            TransactionManager::new(repo.clone()).with_timeout(config.transaction_timeout());
        Self { repo, transactions }
    }

    /// Connect and apply migrations.
    pub async fn init(config: &DatabaseConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo, config))
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // Pool handles are reference counted, so each call gets its own.
    fn store(&self) -> Repository {
        self.repo.clone()
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move `amount` from one account to another.
    ///
    /// Invalid requests are rejected before a connection is taken from the
    /// pool. Conflicts are returned to the caller, never retried here; check
    /// [`AppError::is_retryable`].
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, AppError> {
        params.validate()?;

        let result = self
            .transactions
            .run_in_transaction(move |store| Box::pin(execute_transfer(store, params)))
            .await?;

        info!(
            transfer_id = result.transfer.id,
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "transfer committed"
        );
        Ok(result)
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        Ok(self.store().get_transfer(id).await?)
    }

    pub async fn list_transfers(
        &self,
        filter: TransferFilter,
        page: Page,
    ) -> Result<Vec<Transfer>, AppError> {
        Ok(self.store().list_transfers(filter, page).await?)
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account with an opening balance.
    pub async fn create_account(
        &self,
        owner: &str,
        balance: Cents,
        currency: &str,
    ) -> Result<Account, AppError> {
        let owner = owner.trim();
        let currency = currency.trim().to_uppercase();
        if owner.is_empty() {
            return Err(AppError::InvalidAccount("owner must not be empty".to_string()));
        }
        if currency.is_empty() {
            return Err(AppError::InvalidAccount(
                "currency must not be empty".to_string(),
            ));
        }

        let params = CreateAccountParams::new(owner, balance, currency);
        let account = self.store().create_account(&params).await?;
        debug!(account_id = account.id, owner = %account.owner, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        Ok(self.store().get_account(id).await?)
    }

    pub async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, AppError> {
        Ok(self.store().list_accounts(page).await?)
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, AppError> {
        Ok(self.store().get_entry(id).await?)
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, AppError> {
        Ok(self.store().list_entries(account_id, page).await?)
    }

    // ========================
    // Integrity
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.store().integrity_stats().await?;
        let report = build_integrity_report(stats);
        if !report.is_ok() {
            warn!(issues = report.issues.len(), "ledger integrity check failed");
        }
        Ok(report)
    }
}

/// The transfer protocol, run against whatever store it is handed.
///
/// Intended to run inside [`TransactionManager::run_in_transaction`]: every
/// step returns on the first error, leaving the rollback to the caller.
/// Balance updates are applied in ascending account id order so that two
/// transfers between the same accounts, in either direction, never wait on
/// each other's row locks in opposite orders.
pub async fn execute_transfer<S>(
    store: &mut S,
    params: TransferParams,
) -> Result<TransferResult, AppError>
where
    S: LedgerStore + ?Sized,
{
    params.validate()?;

    let transfer = store.create_transfer(&params).await?;
    debug!(transfer_id = transfer.id, "transfer record created");

    let from_entry = store.create_entry(&params.debit_entry()).await?;
    let to_entry = store.create_entry(&params.credit_entry()).await?;
    debug_assert!(entries_balance(&from_entry, &to_entry));
    debug!(
        transfer_id = transfer.id,
        from_entry_id = from_entry.id,
        to_entry_id = to_entry.id,
        "entries created"
    );

    let [first, second] = params.balance_updates();
    let first_account = store
        .add_account_balance(first.account_id, first.delta)
        .await?;
    let second_account = store
        .add_account_balance(second.account_id, second.delta)
        .await?;
    debug!(
        transfer_id = transfer.id,
        first_account_id = first.account_id,
        second_account_id = second.account_id,
        "balances updated"
    );

    let (from_account, to_account) = if first.account_id == params.from_account_id {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
