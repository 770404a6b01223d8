//! SQL for the ledger tables.
//!
//! Every function runs against any sqlx executor, so the same statements back
//! both the pooled [`Repository`](super::Repository) and the transaction-bound
//! [`TxRepository`](super::TxRepository).

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection};

use crate::domain::{
    Account, AccountId, AccountMismatch, BalanceDrift, Cents, CreateAccountParams,
    CreateEntryParams, Entry, EntryId, IntegrityStats, Transfer, TransferId, TransferParams,
};

use super::{Entity, Page, StoreError, TransferFilter};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

// ========================
// Accounts
// ========================

pub async fn create_account<'e, E>(
    exec: E,
    params: &CreateAccountParams,
) -> Result<Account, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO accounts (owner, balance, opening_balance, currency, created_at) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&params.owner)
        .bind(params.balance)
        .bind(params.balance)
        .bind(&params.currency)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(exec)
        .await?;
    row_to_account(&row)
}

/// Plain lookup. SQLite has no `SELECT ... FOR UPDATE`; inside a transaction
/// that has already written, the read runs under the database write lock.
pub async fn get_account<'e, E>(exec: E, id: AccountId) -> Result<Account, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(exec).await?;
    match row {
        Some(row) => row_to_account(&row),
        None => Err(StoreError::not_found(Entity::Account, id)),
    }
}

pub async fn list_accounts<'e, E>(exec: E, page: Page) -> Result<Vec<Account>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM accounts ORDER BY id LIMIT ? OFFSET ?",
        ACCOUNT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(exec)
        .await?;
    rows.iter().map(row_to_account).collect()
}

/// Apply a signed delta to a balance and return the updated account.
///
/// The current balance is read first so an out-of-range result is rejected
/// before SQLite silently widens the column to REAL.
pub async fn add_account_balance(
    conn: &mut SqliteConnection,
    id: AccountId,
    delta: Cents,
) -> Result<Account, StoreError> {
    let current = get_account(&mut *conn, id).await?;
    if current.balance.checked_add(delta).is_none() {
        return Err(StoreError::BalanceOverflow {
            id,
            balance: current.balance,
            delta,
        });
    }

    let sql = format!(
        "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING {}",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => row_to_account(&row),
        None => Err(StoreError::not_found(Entity::Account, id)),
    }
}

pub async fn delete_account<'e, E>(exec: E, id: AccountId) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id)
        .execute(exec)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found(Entity::Account, id));
    }
    Ok(())
}

// ========================
// Entries
// ========================

pub async fn create_entry<'e, E>(exec: E, params: &CreateEntryParams) -> Result<Entry, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?) RETURNING {}",
        ENTRY_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(params.account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(exec)
        .await?;
    row_to_entry(&row)
}

pub async fn get_entry<'e, E>(exec: E, id: EntryId) -> Result<Entry, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(exec).await?;
    match row {
        Some(row) => row_to_entry(&row),
        None => Err(StoreError::not_found(Entity::Entry, id)),
    }
}

pub async fn list_entries<'e, E>(
    exec: E,
    account_id: AccountId,
    page: Page,
) -> Result<Vec<Entry>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?",
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(exec)
        .await?;
    rows.iter().map(row_to_entry).collect()
}

// ========================
// Transfers
// ========================

pub async fn create_transfer<'e, E>(
    exec: E,
    params: &TransferParams,
) -> Result<Transfer, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at) VALUES (?, ?, ?, ?) RETURNING {}",
        TRANSFER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(exec)
        .await?;
    row_to_transfer(&row)
}

pub async fn get_transfer<'e, E>(exec: E, id: TransferId) -> Result<Transfer, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM transfers WHERE id = ?", TRANSFER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(exec).await?;
    match row {
        Some(row) => row_to_transfer(&row),
        None => Err(StoreError::not_found(Entity::Transfer, id)),
    }
}

pub async fn list_transfers<'e, E>(
    exec: E,
    filter: TransferFilter,
    page: Page,
) -> Result<Vec<Transfer>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut sql = format!("SELECT {} FROM transfers WHERE 1=1", TRANSFER_COLUMNS);
    if filter.from_account_id.is_some() {
        sql.push_str(" AND from_account_id = ?");
    }
    if filter.to_account_id.is_some() {
        sql.push_str(" AND to_account_id = ?");
    }
    sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");

    let mut query = sqlx::query(&sql);
    if let Some(from) = filter.from_account_id {
        query = query.bind(from);
    }
    if let Some(to) = filter.to_account_id {
        query = query.bind(to);
    }

    let rows = query
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(exec)
        .await?;
    rows.iter().map(row_to_transfer).collect()
}

// ========================
// Integrity
// ========================

pub async fn integrity_stats(conn: &mut SqliteConnection) -> Result<IntegrityStats, StoreError> {
    let counts = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM accounts) as account_count,
            (SELECT COUNT(*) FROM transfers) as transfer_count,
            (SELECT COUNT(*) FROM entries) as entry_count,
            (SELECT COUNT(*) FROM transfers WHERE amount <= 0) as invalid_amounts,
            (SELECT COUNT(*) FROM transfers WHERE from_account_id = to_account_id) as self_transfers,
            (SELECT COALESCE(SUM(amount), 0) FROM entries) as entry_sum
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    // Per account: what the entries say vs what the transfers say
    let mismatches = sqlx::query(
        r#"
        SELECT account_id, SUM(entry_amount) as entry_sum, SUM(flow_amount) as transfer_flow
        FROM (
            SELECT account_id, amount as entry_amount, 0 as flow_amount FROM entries
            UNION ALL
            SELECT to_account_id as account_id, 0, amount FROM transfers
            UNION ALL
            SELECT from_account_id as account_id, 0, -amount FROM transfers
        )
        GROUP BY account_id
        HAVING SUM(entry_amount) <> SUM(flow_amount)
        ORDER BY account_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    // Per account: how far the balance moved vs what the entries say
    let drifts = sqlx::query(
        r#"
        SELECT a.id as account_id,
               a.balance - a.opening_balance as balance_change,
               COALESCE(SUM(e.amount), 0) as entry_sum
        FROM accounts a
        LEFT JOIN entries e ON e.account_id = a.id
        GROUP BY a.id
        HAVING a.balance - a.opening_balance <> COALESCE(SUM(e.amount), 0)
        ORDER BY a.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(IntegrityStats {
        account_count: counts.try_get("account_count")?,
        transfer_count: counts.try_get("transfer_count")?,
        entry_count: counts.try_get("entry_count")?,
        invalid_amounts: counts.try_get("invalid_amounts")?,
        self_transfers: counts.try_get("self_transfers")?,
        entry_sum: counts.try_get("entry_sum")?,
        mismatched_accounts: mismatches
            .iter()
            .map(|row| -> Result<AccountMismatch, sqlx::Error> {
                Ok(AccountMismatch {
                    account_id: row.try_get("account_id")?,
                    entry_sum: row.try_get("entry_sum")?,
                    transfer_flow: row.try_get("transfer_flow")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()?,
        drifted_accounts: drifts
            .iter()
            .map(|row| -> Result<BalanceDrift, sqlx::Error> {
                Ok(BalanceDrift {
                    account_id: row.try_get("account_id")?,
                    balance_change: row.try_get("balance_change")?,
                    entry_sum: row.try_get("entry_sum")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()?,
    })
}

// ========================
// Row mapping
// ========================

fn parse_timestamp(column: &'static str, value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Decode { column, value })
}

fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: parse_timestamp("accounts.created_at", row.try_get("created_at")?)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry, StoreError> {
    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp("entries.created_at", row.try_get("created_at")?)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer, StoreError> {
    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp("transfers.created_at", row.try_get("created_at")?)?,
    })
}
