use thiserror::Error;

/// Which table a lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Entry,
    Transfer,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Account => write!(f, "account"),
            Entity::Entry => write!(f, "entry"),
            Entity::Transfer => write!(f, "transfer"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("Referenced row does not exist: {0}")]
    MissingReference(#[source] sqlx::Error),

    #[error("Concurrent modification, transaction aborted: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("Balance of account {id} would overflow: {balance} + {delta}")]
    BalanceOverflow { id: i64, balance: i64, delta: i64 },

    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    #[error("Invalid {column} value in database: {value:?}")]
    Decode { column: &'static str, value: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return StoreError::PoolExhausted;
        }
        let (missing_reference, conflict) = match err.as_database_error() {
            Some(db_err) => (
                db_err.is_foreign_key_violation(),
                is_conflict_code(db_err.code().as_deref()),
            ),
            None => (false, false),
        };

        if missing_reference {
            StoreError::MissingReference(err)
        } else if conflict {
            StoreError::Conflict(err)
        } else {
            StoreError::Database(err)
        }
    }
}

/// Whether a database error code means "another transaction got in the way".
///
/// SQLite reports numeric (extended) result codes: the primary code lives in
/// the low byte, 5 = SQLITE_BUSY and 6 = SQLITE_LOCKED. Postgres reports
/// SQLSTATE 40001 (serialization failure) and 40P01 (deadlock detected).
pub fn is_conflict_code(code: Option<&str>) -> bool {
    match code {
        Some("40001") | Some("40P01") => true,
        Some(code) => code
            .parse::<i32>()
            .map(|c| matches!(c & 0xff, 5 | 6))
            .unwrap_or(false),
        None => false,
    }
}
