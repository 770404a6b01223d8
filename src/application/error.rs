use thiserror::Error;

use crate::domain::{AccountId, Cents, EntryId, InvalidTransfer, TransferId};
use crate::storage::{Entity, StoreError};

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request can never succeed as given; do not retry.
    Validation,
    /// A referenced row does not exist.
    NotFound,
    /// Aborted by a concurrent transaction; retry with backoff.
    Conflict,
    /// No connection or no time left; retry later.
    Unavailable,
    /// Begin/commit/rollback failed at the infrastructure level.
    Transaction,
    Internal,
}

/// Which transaction step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
}

impl std::fmt::Display for TxOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxOp::Begin => write!(f, "begin"),
            TxOp::Commit => write!(f, "commit"),
            TxOp::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0} cents, must be positive")]
    InvalidAmount(Cents),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Balance of account {account_id} cannot absorb {delta} cents")]
    BalanceOverflow { account_id: AccountId, delta: Cents },

    #[error("Referenced account does not exist: {0}")]
    MissingAccount(#[source] StoreError),

    #[error("Transaction conflict, retry: {0}")]
    Conflict(#[source] StoreError),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Transaction timed out and was rolled back")]
    TimedOut,

    #[error("Transaction {op} failed: {source}")]
    Transaction {
        op: TxOp,
        #[source]
        source: StoreError,
    },

    #[error("{source} (rollback also failed: {rollback})")]
    RollbackFailed {
        #[source]
        source: Box<AppError>,
        rollback: StoreError,
    },

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidAmount(_)
            | AppError::SameAccount(_)
            | AppError::InvalidAccount(_)
            | AppError::BalanceOverflow { .. } => ErrorKind::Validation,
            AppError::AccountNotFound(_)
            | AppError::EntryNotFound(_)
            | AppError::TransferNotFound(_)
            | AppError::MissingAccount(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::PoolExhausted | AppError::TimedOut => ErrorKind::Unavailable,
            AppError::Transaction { .. } | AppError::RollbackFailed { .. } => {
                ErrorKind::Transaction
            }
            AppError::Storage(_) | AppError::Database(_) => ErrorKind::Internal,
        }
    }

    /// True when running the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Unavailable)
    }

    /// Classify a failed begin/commit/rollback. Contention and pool
    /// exhaustion keep their own kinds so callers can still retry them.
    pub fn transaction(op: TxOp, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AppError::Conflict(err),
            StoreError::PoolExhausted => AppError::PoolExhausted,
            other => AppError::Transaction { op, source: other },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                entity: Entity::Account,
                id,
            } => AppError::AccountNotFound(id),
            StoreError::NotFound {
                entity: Entity::Entry,
                id,
            } => AppError::EntryNotFound(id),
            StoreError::NotFound {
                entity: Entity::Transfer,
                id,
            } => AppError::TransferNotFound(id),
            StoreError::BalanceOverflow { id, delta, .. } => AppError::BalanceOverflow {
                account_id: id,
                delta,
            },
            StoreError::MissingReference(_) => AppError::MissingAccount(err),
            StoreError::Conflict(_) => AppError::Conflict(err),
            StoreError::PoolExhausted => AppError::PoolExhausted,
            StoreError::Decode { .. } | StoreError::Database(_) => AppError::Storage(err),
        }
    }
}

impl From<InvalidTransfer> for AppError {
    fn from(err: InvalidTransfer) -> Self {
        match err {
            InvalidTransfer::NonPositiveAmount(amount) => AppError::InvalidAmount(amount),
            InvalidTransfer::SameAccount(id) => AppError::SameAccount(id),
        }
    }
}
