use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};

use crate::domain::{Account, AccountId, Cents, Transaction, TransactionKind};

use super::MIGRATION_001_INITIAL;

/// An open unit of work. Dropping it without calling `commit` rolls it back.
pub type UnitOfWork = sqlx::Transaction<'static, Sqlite>;

/// Connection pool tuning.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a writer waits for the database lock before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Storage gateway for accounts and their transactions.
///
/// Read helpers run directly on the pool. Write helpers take a connection
/// borrowed from a [`UnitOfWork`] so that the caller decides what commits
/// together.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database, creating the file if it doesn't exist.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(settings.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str, settings: &PoolSettings) -> Result<Self> {
        let repo = Self::connect(database_url, settings).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a unit of work.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Account reads
    // ========================

    /// Get an account by username.
    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, balance, created_at
            FROM accounts
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by username")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    // ========================
    // Account writes
    // ========================

    /// Insert a new account. Returns `None` if the username is already taken.
    pub async fn insert_account(
        conn: &mut SqliteConnection,
        username: &str,
        balance: Cents,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (username, balance)
            VALUES (?, ?)
            ON CONFLICT(username) DO NOTHING
            RETURNING id, username, balance, created_at
            "#,
        )
        .bind(username)
        .bind(balance)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to insert account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Add `amount` to the stored balance. The arithmetic happens in the
    /// statement, so concurrent credits cannot overwrite each other.
    /// Returns the new balance, or `None` if no row matched (unknown account
    /// or the sum would overflow).
    pub async fn apply_credit(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ? AND balance <= ? - ?
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(account_id)
        .bind(i64::MAX)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to credit account balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    /// Subtract `amount` from the stored balance only if the balance covers
    /// it. Condition and mutation are one statement.
    /// Returns the new balance, or `None` if no row matched (insufficient
    /// funds or unknown account).
    pub async fn apply_debit(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance - ?
            WHERE id = ? AND balance >= ?
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit account balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    /// Read the balance as seen from inside a unit of work.
    pub async fn current_balance(
        conn: &mut SqliteConnection,
        account_id: AccountId,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to read account balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    // ========================
    // Transaction records
    // ========================

    /// Insert a ledger entry. Identifier and timestamp are assigned by the
    /// database.
    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount: Cents,
        kind: TransactionKind,
    ) -> Result<Transaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (account_id, amount, kind)
            VALUES (?, ?, ?)
            RETURNING id, account_id, amount, kind, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(kind.as_str())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert transaction")?;

        Self::row_to_transaction(&row)
    }

    /// List an account's transactions, newest first.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, kind, created_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        // SQLite treats a negative LIMIT as "no limit"
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count an account's transactions.
    pub async fn count_transactions(&self, account_id: AccountId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;

        Ok(row.get("count"))
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let created_at: Option<String> = row.get("created_at");

        Ok(Account {
            id: row.get("id"),
            username: row.get("username"),
            balance: row.get("balance"),
            created_at: created_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .context("Invalid account created_at")?,
        })
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: row.get("id"),
            account_id: row.get("account_id"),
            amount: row.get("amount"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            created_at: parse_timestamp(&created_at_str)
                .context("Invalid transaction created_at")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
