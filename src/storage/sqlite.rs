use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Customer, CustomerId, Transaction, TransactionId, TransactionKind,
};

use super::{LedgerPosting, MIGRATION_001_INITIAL, Repository, StoreError};

const CUSTOMER_COLUMNS: &str =
    "id, first_name, last_name, email, phone, address, date_of_birth, created_at";

const ACCOUNT_COLUMNS: &str = "id, customer_id, account_number, owner_name, balance_cents, opening_balance_cents, created_at";

const TRANSACTION_COLUMNS: &str = "id, account_id, sequence, kind, amount_cents, description, balance_before_cents, balance_after_cents, timestamp";

/// Repository backed by a SQLite database.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL such as `sqlite:bank.db?mode=rwc`.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    fn row_to_customer(row: &SqliteRow) -> anyhow::Result<Customer> {
        let id_str: String = row.get("id");
        let dob_str: String = row.get("date_of_birth");
        let created_at_str: String = row.get("created_at");

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            phone: row.get("phone"),
            address: row.get("address"),
            date_of_birth: NaiveDate::from_str(&dob_str).context("Invalid date_of_birth")?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    fn row_to_account(row: &SqliteRow) -> anyhow::Result<Account> {
        let id_str: String = row.get("id");
        let customer_id_str: String = row.get("customer_id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            customer_id: Uuid::parse_str(&customer_id_str).context("Invalid customer ID")?,
            account_number: row.get("account_number"),
            owner_name: row.get("owner_name"),
            balance: row.get("balance_cents"),
            opening_balance: row.get("opening_balance_cents"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    fn row_to_transaction(row: &SqliteRow) -> anyhow::Result<Transaction> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            sequence: row.get("sequence"),
            kind: TransactionKind::from_str(&kind_str).map_err(anyhow::Error::msg)?,
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            balance_before: row.get("balance_before_cents"),
            balance_after: row.get("balance_after_cents"),
            timestamp: parse_timestamp(&timestamp_str).context("Invalid timestamp")?,
        })
    }
}

/// Timestamps are stored as fixed-width RFC 3339 so that text order is time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Map a failed insert to `Duplicate` when a unique constraint rejected it.
fn insert_error(
    err: sqlx::Error,
    field: &'static str,
    value: &str,
    context: &'static str,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                field,
                value: value.to_string(),
            };
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(context))
}

#[async_trait]
impl Repository for SqliteRepository {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    // ========================
    // Customer operations
    // ========================

    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, first_name, last_name, email, phone, address, date_of_birth, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.date_of_birth.to_string())
        .bind(format_timestamp(customer.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "email", &customer.email, "Failed to save customer"))?;
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE id = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        Ok(row.as_ref().map(Self::row_to_customer).transpose()?)
    }

    async fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE email = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer by email")?;

        Ok(row.as_ref().map(Self::row_to_customer).transpose()?)
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers ORDER BY created_at, id",
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        Ok(rows
            .iter()
            .map(Self::row_to_customer)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError> {
        let id_str = id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin delete")?;

        sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE account_id IN (SELECT id FROM accounts WHERE customer_id = ?)
            "#,
        )
        .bind(&id_str)
        .execute(&mut *tx)
        .await
        .context("Failed to delete customer transactions")?;

        sqlx::query("DELETE FROM accounts WHERE customer_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete customer accounts")?;

        let deleted = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete customer")?
            .rows_affected();

        tx.commit().await.context("Failed to commit delete")?;
        Ok(deleted > 0)
    }

    // ========================
    // Account operations
    // ========================

    async fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, account_number, owner_name, balance_cents, opening_balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.customer_id.to_string())
        .bind(&account.account_number)
        .bind(&account.owner_name)
        .bind(account.balance)
        .bind(account.opening_balance)
        .bind(format_timestamp(account.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            insert_error(
                e,
                "account number",
                &account.account_number,
                "Failed to save account",
            )
        })?;
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        Ok(row.as_ref().map(Self::row_to_account).transpose()?)
    }

    async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE account_number = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        Ok(row.as_ref().map(Self::row_to_account).transpose()?)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        Ok(rows
            .iter()
            .map(Self::row_to_account)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_accounts_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE customer_id = ? ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .bind(customer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts for customer")?;

        Ok(rows
            .iter()
            .map(Self::row_to_account)
            .collect::<anyhow::Result<_>>()?)
    }

    // ========================
    // Transaction operations
    // ========================

    async fn commit_postings(&self, postings: &mut [LedgerPosting]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin ledger commit")?;

        for posting in postings.iter_mut() {
            // Compare-and-set: a stale expected balance (or a vanished account)
            // matches no row.
            let updated = sqlx::query(
                "UPDATE accounts SET balance_cents = ? WHERE id = ? AND balance_cents = ?",
            )
            .bind(posting.transaction.balance_after)
            .bind(posting.account_id.to_string())
            .bind(posting.expected_balance)
            .execute(&mut *tx)
            .await
            .context("Failed to update account balance")?
            .rows_affected();

            if updated == 0 {
                // Dropping `tx` rolls back earlier postings.
                return Err(StoreError::BalanceChanged(posting.account_id));
            }

            let row = sqlx::query(
                r#"
                UPDATE sequence_counter
                SET value = value + 1
                WHERE name = 'transaction_sequence'
                RETURNING value
                "#,
            )
            .fetch_one(&mut *tx)
            .await
            .context("Failed to get next sequence number")?;
            posting.transaction.sequence = row.get("value");

            let t = &posting.transaction;
            sqlx::query(
                r#"
                INSERT INTO transactions (id, account_id, sequence, kind, amount_cents, description, balance_before_cents, balance_after_cents, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(t.id.to_string())
            .bind(t.account_id.to_string())
            .bind(t.sequence)
            .bind(t.kind.as_str())
            .bind(t.amount_cents)
            .bind(&t.description)
            .bind(t.balance_before)
            .bind(t.balance_after)
            .bind(format_timestamp(t.timestamp))
            .execute(&mut *tx)
            .await
            .context("Failed to save transaction")?;
        }

        tx.commit().await.context("Failed to commit ledger postings")?;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        Ok(row.as_ref().map(Self::row_to_transaction).transpose()?)
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions ORDER BY timestamp DESC, sequence DESC",
            TRANSACTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        Ok(rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE account_id = ? ORDER BY timestamp DESC, sequence DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        Ok(rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<anyhow::Result<_>>()?)
    }
}
