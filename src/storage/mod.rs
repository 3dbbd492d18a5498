mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Account, AccountId, Cents, Customer, CustomerId, Transaction, TransactionId,
};

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// The account balance no longer matches the posting's expected balance,
    /// or the account is gone.
    #[error("balance of account {0} changed concurrently")]
    BalanceChanged(AccountId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// One account-side write of a ledger event: move the account from
/// `expected_balance` to `transaction.balance_after` and append `transaction`.
#[derive(Debug, Clone)]
pub struct LedgerPosting {
    pub account_id: AccountId,
    pub expected_balance: Cents,
    pub transaction: Transaction,
}

impl LedgerPosting {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            account_id: transaction.account_id,
            expected_balance: transaction.balance_before,
            transaction,
        }
    }
}

/// Persistence for customers, accounts and their transactions.
///
/// Lists of transactions are returned newest first.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Short name of the backing store, for diagnostics.
    fn backend_name(&self) -> &'static str;

    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError>;

    /// Delete a customer with all its accounts and their transactions, in that
    /// order, as one atomic unit. Returns false if the customer does not exist.
    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError>;

    async fn save_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn list_accounts_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, StoreError>;

    /// Commit every posting or none: each account balance is compared against
    /// its expected balance and updated, and each transaction is appended with
    /// a freshly assigned sequence number.
    async fn commit_postings(&self, postings: &mut [LedgerPosting]) -> Result<(), StoreError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError>;
}
