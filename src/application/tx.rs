use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use crate::storage::{Repository, Transactional, TxRepository};

use super::{AppError, TxOp};

/// Runs units of work inside a database transaction.
///
/// The unit of work receives a [`TxRepository`] bound to the open
/// transaction. An `Err` rolls everything back and is returned unchanged (or
/// wrapped in [`AppError::RollbackFailed`] if the rollback fails too); `Ok`
/// commits. Nothing a failed unit of work wrote is ever visible.
#[derive(Clone)]
pub struct TransactionManager {
    repo: Repository,
    timeout: Option<Duration>,
}

impl TransactionManager {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            timeout: None,
        }
    }

    /// Bound the unit of work plus commit. On expiry the transaction is
    /// dropped, which rolls it back, and [`AppError::TimedOut`] is returned.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run_in_transaction<T, F>(&self, unit_of_work: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut TxRepository) -> BoxFuture<'s, Result<T, AppError>> + Send,
    {
        let store = self
            .repo
            .begin()
            .await
            .map_err(|err| AppError::transaction(TxOp::Begin, err))?;

        let run = Self::execute(store, unit_of_work);
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "transaction timed out");
                    Err(AppError::TimedOut)
                }
            },
            None => run.await,
        }
    }

    async fn execute<S, T, F>(mut store: S, unit_of_work: F) -> Result<T, AppError>
    where
        S: Transactional,
        F: for<'s> FnOnce(&'s mut S) -> BoxFuture<'s, Result<T, AppError>>,
    {
        match unit_of_work(&mut store).await {
            Ok(value) => {
                store
                    .commit()
                    .await
                    .map_err(|err| AppError::transaction(TxOp::Commit, err))?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => match store.rollback().await {
                Ok(()) => {
                    warn!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    error!(error = %err, rollback_error = %rollback, "rollback failed");
                    Err(AppError::RollbackFailed {
                        source: Box::new(err),
                        rollback,
                    })
                }
            },
        }
    }
}
