use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{
    Account, AccountId, Cents, Customer, CustomerId, Transaction, TransactionId, sort_chain,
};

use super::{LedgerPosting, Repository, StoreError};

#[derive(Debug, Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<AccountId, Account>,
    transactions: Vec<Transaction>,
    next_sequence: i64,
}

/// In-memory repository.
///
/// Intended for tests and embedding. Every operation runs under one mutex, so
/// multi-row writes are trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }
}

fn newest_first(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    sort_chain(&mut transactions);
    transactions.reverse();
    transactions
}

fn by_creation<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, uuid::Uuid),
{
    items.sort_by_key(key);
    items
}

#[async_trait]
impl Repository for MemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::Duplicate {
                field: "email",
                value: customer.email.clone(),
            });
        }
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.state()?.customers.get(&id).cloned())
    }

    async fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .state()?
            .customers
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let customers: Vec<Customer> = self.state()?.customers.values().cloned().collect();
        Ok(by_creation(customers, |c: &Customer| (c.created_at, c.id)))
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        if !state.customers.contains_key(&id) {
            return Ok(false);
        }

        let owned: Vec<AccountId> = state
            .accounts
            .values()
            .filter(|a| a.customer_id == id)
            .map(|a| a.id)
            .collect();

        state.transactions.retain(|t| !owned.contains(&t.account_id));
        for account_id in &owned {
            state.accounts.remove(account_id);
        }
        state.customers.remove(&id);
        Ok(true)
    }

    async fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.customers.contains_key(&account.customer_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "customer {} does not exist",
                account.customer_id
            )));
        }
        if state
            .accounts
            .values()
            .any(|a| a.account_number == account.account_number)
        {
            return Err(StoreError::Duplicate {
                field: "account number",
                value: account.account_number.clone(),
            });
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .state()?
            .accounts
            .values()
            .find(|a| a.account_number == account_number)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts: Vec<Account> = self.state()?.accounts.values().cloned().collect();
        Ok(by_creation(accounts, |a: &Account| (a.created_at, a.id)))
    }

    async fn list_accounts_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, StoreError> {
        let accounts: Vec<Account> = self
            .state()?
            .accounts
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(by_creation(accounts, |a: &Account| (a.created_at, a.id)))
    }

    async fn commit_postings(&self, postings: &mut [LedgerPosting]) -> Result<(), StoreError> {
        let mut state = self.state()?;

        // Validate everything first so a failure leaves nothing applied.
        let mut pending: HashMap<AccountId, Cents> = HashMap::new();
        for posting in postings.iter() {
            let current = match pending.get(&posting.account_id) {
                Some(balance) => Some(*balance),
                None => state.accounts.get(&posting.account_id).map(|a| a.balance),
            };
            if current != Some(posting.expected_balance) {
                return Err(StoreError::BalanceChanged(posting.account_id));
            }
            pending.insert(posting.account_id, posting.transaction.balance_after);
        }

        for posting in postings.iter_mut() {
            state.next_sequence += 1;
            posting.transaction.sequence = state.next_sequence;
            if let Some(account) = state.accounts.get_mut(&posting.account_id) {
                account.balance = posting.transaction.balance_after;
            }
            state.transactions.push(posting.transaction.clone());
        }
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .state()?
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let transactions = self.state()?.transactions.clone();
        Ok(newest_first(transactions))
    }

    async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let transactions: Vec<Transaction> = self
            .state()?
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        Ok(newest_first(transactions))
    }
}
