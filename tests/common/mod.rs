// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use simplebank::application::TransferService;
use simplebank::config::{DatabaseConfig, LogConfig};
use simplebank::domain::{Account, AccountId};
use simplebank::logging::init_logging;
use simplebank::storage::{Page, TransferFilter};
use tempfile::TempDir;

/// Config for a fresh database file inside `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> DatabaseConfig {
    let db_path = temp_dir.path().join("test.db");
    DatabaseConfig::for_path(db_path.to_str().unwrap())
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TransferService, TempDir)> {
    test_service_with(|_| {}).await
}

/// Same as [`test_service`] but lets the caller tweak the config first
pub async fn test_service_with(
    customize: impl FnOnce(&mut DatabaseConfig),
) -> Result<(TransferService, TempDir)> {
    init_logging(&LogConfig {
        level: "warn".to_string(),
        use_json: false,
    });

    let temp_dir = TempDir::new()?;
    let mut config = test_config(&temp_dir);
    customize(&mut config);
    let service = TransferService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Test fixture: Standard account setup
pub struct StandardAccounts;

impl StandardAccounts {
    /// Two EUR accounts: alice with 100, bob with 50
    pub async fn create_pair(service: &TransferService) -> Result<(Account, Account)> {
        let alice = service.create_account("alice", 100, "EUR").await?;
        let bob = service.create_account("bob", 50, "EUR").await?;
        Ok((alice, bob))
    }
}

pub async fn balance_of(service: &TransferService, id: AccountId) -> Result<i64> {
    Ok(service.get_account(id).await?.balance)
}

pub async fn transfer_count(service: &TransferService) -> Result<usize> {
    let transfers = service
        .list_transfers(TransferFilter::default(), Page::new(10_000, 0))
        .await?;
    Ok(transfers.len())
}

pub async fn entry_count(service: &TransferService, account_id: AccountId) -> Result<usize> {
    let entries = service
        .list_entries(account_id, Page::new(10_000, 0))
        .await?;
    Ok(entries.len())
}
