use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Account, AccountId, Cents, Customer, CustomerId, IntegrityReport, LedgerError, NewCustomer,
    Transaction, TransactionId, TransactionKind, MIN_ACCOUNT_NUMBER_LEN,
    compute_balance_after, format_cents, is_valid_email, is_valid_phone, normalize_email,
    sort_chain, verify_chain,
};
use crate::storage::{LedgerPosting, MemoryRepository, Repository, SqliteRepository, StoreError};

use super::{AccountLocks, AppError};

/// Tunables of the ledger service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How many times a posting is recomputed after the store reports that the
    /// balance changed underneath it.
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Application service providing high-level operations for the bank.
/// This is the primary interface for any client (CLI, HTTP API, etc.).
pub struct LedgerService {
    repo: Arc<dyn Repository>,
    locks: AccountLocks,
    config: ServiceConfig,
}

/// Detailed customer information
pub struct CustomerInfo {
    pub customer: Customer,
    pub accounts: Vec<Account>,
}

/// Detailed account information
pub struct AccountInfo {
    pub account: Account,
    pub transaction_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

impl LedgerService {
    /// Create a new service on top of the given repository.
    pub fn new(repo: Arc<dyn Repository>, config: ServiceConfig) -> Self {
        Self {
            repo,
            locks: AccountLocks::new(),
            config,
        }
    }

    /// Initialize (create and migrate) a database at the given path.
    pub async fn init(database_path: &str, config: ServiceConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = SqliteRepository::init(&db_url).await?;
        Ok(Self::new(Arc::new(repo), config))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: ServiceConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = SqliteRepository::connect(&db_url).await?;
        Ok(Self::new(Arc::new(repo), config))
    }

    /// A service over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()), ServiceConfig::default())
    }

    pub fn backend_name(&self) -> &'static str {
        self.repo.backend_name()
    }

    /// Number of accounts with a live entry in the lock registry.
    pub fn locked_account_count(&self) -> usize {
        self.locks.len()
    }

    // ========================
    // Customer operations
    // ========================

    /// Register a new customer.
    pub async fn create_customer(&self, input: NewCustomer) -> Result<Customer, AppError> {
        validate_new_customer(&input)?;

        let email = normalize_email(&input.email);
        if self.repo.get_customer_by_email(&email).await?.is_some() {
            warn!(%email, "duplicate email");
            return Err(AppError::DuplicateEmail(email));
        }

        let customer = Customer::new(input);
        self.repo.save_customer(&customer).await?;

        info!(customer_id = %customer.id, email = %customer.email, "customer created");
        Ok(customer)
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or(AppError::CustomerNotFound(id))
    }

    /// Get a customer together with the accounts it owns.
    pub async fn get_customer_info(&self, id: CustomerId) -> Result<CustomerInfo, AppError> {
        let customer = self.get_customer(id).await?;
        let accounts = self.repo.list_accounts_for_customer(id).await?;
        Ok(CustomerInfo { customer, accounts })
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers().await?)
    }

    /// Delete a customer together with its accounts and their transactions.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        let customer = match self.repo.get_customer(id).await? {
            Some(customer) => customer,
            None => {
                warn!("customer not found for deletion");
                return Err(AppError::CustomerNotFound(id));
            }
        };

        // No transaction may be applied to these accounts while they go away.
        // An account opened between listing and locking forces another round.
        let mut attempt = 0;
        let (account_ids, guards) = loop {
            let account_ids = self.account_ids_of(id).await?;
            let guards = self.locks.lock_many(&account_ids).await;
            if self.account_ids_of(id).await? == account_ids {
                break (account_ids, guards);
            }
            drop(guards);
            if attempt >= self.config.max_retries {
                return Err(AppError::Concurrency(format!(
                    "accounts of customer {} kept changing during deletion",
                    id
                )));
            }
            attempt += 1;
            debug!(attempt, "customer accounts changed before deletion, retrying");
        };

        let deleted = self.repo.delete_customer(id).await?;
        drop(guards);

        if !deleted {
            return Err(AppError::CustomerNotFound(id));
        }
        for account_id in &account_ids {
            self.locks.forget(*account_id);
        }

        info!(accounts = account_ids.len(), "customer deleted");
        Ok(customer)
    }

    async fn account_ids_of(&self, customer_id: CustomerId) -> Result<Vec<AccountId>, AppError> {
        let mut ids: Vec<AccountId> = self
            .repo
            .list_accounts_for_customer(customer_id)
            .await?
            .iter()
            .map(|a| a.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account for an existing customer. The initial balance is not a
    /// ledger event: no transaction is recorded for it.
    pub async fn create_account(
        &self,
        customer_id: CustomerId,
        account_number: &str,
        initial_balance: Cents,
        owner_name: &str,
    ) -> Result<Account, AppError> {
        let account_number = account_number.trim();
        if account_number.chars().count() < MIN_ACCOUNT_NUMBER_LEN {
            return Err(AppError::Validation(format!(
                "account number must have at least {} characters",
                MIN_ACCOUNT_NUMBER_LEN
            )));
        }
        if owner_name.trim().is_empty() {
            return Err(AppError::Validation("owner name is required".to_string()));
        }
        if initial_balance < 0 {
            return Err(AppError::InvalidAmount(
                "Initial balance cannot be negative".to_string(),
            ));
        }

        if self.repo.get_customer(customer_id).await?.is_none() {
            warn!(%customer_id, "customer not found");
            return Err(AppError::CustomerNotFound(customer_id));
        }

        if self
            .repo
            .get_account_by_number(account_number)
            .await?
            .is_some()
        {
            warn!(%account_number, "duplicate account number");
            return Err(AppError::DuplicateAccountNumber(account_number.to_string()));
        }

        let account = Account::new(customer_id, account_number, owner_name, initial_balance);
        self.repo.save_account(&account).await?;

        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            balance = %format_cents(account.balance),
            "account created"
        );
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    /// Get detailed account information.
    pub async fn get_account_info(&self, id: AccountId) -> Result<AccountInfo, AppError> {
        let account = self.get_account(id).await?;
        let transactions = self.repo.list_transactions_for_account(id).await?;

        Ok(AccountInfo {
            account,
            transaction_count: transactions.len(),
            last_activity: transactions.first().map(|t| t.timestamp),
        })
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    pub async fn list_accounts_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, AppError> {
        self.get_customer(customer_id).await?;
        Ok(self.repo.list_accounts_for_customer(customer_id).await?)
    }

    // ========================
    // Ledger engine
    // ========================

    /// Apply a deposit, withdrawal or transfer to an account.
    ///
    /// Balance update and transaction record are committed together. Calls for
    /// the same account are serialized; a transfer only debits the source
    /// account.
    #[instrument(skip(self, description), fields(kind = %kind, amount = %format_cents(amount_cents)))]
    pub async fn apply_transaction(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        let description = description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();

        // Unknown ids never reach the lock registry.
        if self.repo.get_account(account_id).await?.is_none() {
            warn!("account not found");
            return Err(AppError::AccountNotFound(account_id));
        }

        let guard = self.locks.lock(account_id).await;

        let mut attempt = 0;
        loop {
            let account = match self.repo.get_account(account_id).await? {
                Some(account) => account,
                None => {
                    // Deleted while we waited for the lock.
                    drop(guard);
                    self.locks.forget(account_id);
                    warn!("account not found");
                    return Err(AppError::AccountNotFound(account_id));
                }
            };

            let balance_before = account.balance;
            let balance_after = compute_balance_after(kind, balance_before, amount_cents)
                .map_err(|e| {
                    if let LedgerError::InsufficientFunds { .. } = e {
                        warn!(balance = %format_cents(balance_before), "insufficient funds");
                    }
                    AppError::from_ledger(account_id, e)
                })?;

            let transaction = Transaction::new(
                account_id,
                kind,
                amount_cents,
                description.clone(),
                balance_before,
                balance_after,
            );
            let mut postings = [LedgerPosting::new(transaction)];

            let committed = self.repo.commit_postings(&mut postings).await;
            match committed {
                Ok(()) => {
                    let [posting] = postings;
                    info!(
                        transaction_id = %posting.transaction.id,
                        balance = %format_cents(balance_after),
                        "transaction applied"
                    );
                    return Ok(posting.transaction);
                }
                Err(StoreError::BalanceChanged(_)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(attempt, "balance changed underneath, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========================
    // Transaction queries
    // ========================

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// List all transactions, newest first.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions().await?)
    }

    /// List the transactions of one account, newest first.
    pub async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_account(account_id).await?;
        Ok(self.repo.list_transactions_for_account(account_id).await?)
    }

    /// The transactions of one account in chain order (oldest first).
    pub async fn account_history(&self, account_id: AccountId) -> Result<Vec<Transaction>, AppError> {
        let mut history = self.list_transactions_for_account(account_id).await?;
        sort_chain(&mut history);
        Ok(history)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Verify the balance chain of every account.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let customers = self.repo.list_customers().await?;
        let accounts = self.repo.list_accounts().await?;

        let mut report = IntegrityReport {
            customer_count: customers.len(),
            account_count: accounts.len(),
            ..IntegrityReport::default()
        };

        for listed in accounts {
            // Hold the account still while its chain is read.
            let guard = self.locks.lock(listed.id).await;
            let Some(account) = self.repo.get_account(listed.id).await? else {
                drop(guard);
                self.locks.forget(listed.id);
                continue;
            };
            let mut history = self.repo.list_transactions_for_account(account.id).await?;
            sort_chain(&mut history);

            report.transaction_count += history.len();
            let issues = verify_chain(&account, &history);
            report.record_account(&account, issues);
        }

        if !report.is_healthy() {
            warn!(issues = report.issues.len(), "ledger integrity check failed");
        }
        Ok(report)
    }
}

fn validate_new_customer(input: &NewCustomer) -> Result<(), AppError> {
    if input.first_name.trim().chars().count() < 2 {
        return Err(AppError::Validation(
            "first name must have at least 2 characters".to_string(),
        ));
    }
    if input.last_name.trim().chars().count() < 2 {
        return Err(AppError::Validation(
            "last name must have at least 2 characters".to_string(),
        ));
    }
    if !is_valid_email(&input.email) {
        return Err(AppError::Validation(format!(
            "invalid email address: {}",
            input.email
        )));
    }
    if !is_valid_phone(&input.phone) {
        return Err(AppError::Validation(format!(
            "invalid phone number: {}",
            input.phone
        )));
    }
    if input.address.trim().is_empty() {
        return Err(AppError::Validation("address is required".to_string()));
    }
    if input.date_of_birth > Utc::now().date_naive() {
        return Err(AppError::Validation(
            "date of birth cannot be in the future".to_string(),
        ));
    }
    Ok(())
}
