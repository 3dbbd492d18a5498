use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::AccountId;

/// Per-account serialization point.
///
/// Every mutation of an account's (balance, history) pair runs while holding
/// that account's guard, so two tasks can never both read the same balance
/// and write independently.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, account_id: AccountId) -> Arc<AsyncMutex<()>> {
        // The registry mutex is only held to look up the entry, never across an await.
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(account_id).or_default().clone()
    }

    /// Wait for exclusive access to one account.
    pub async fn lock(&self, account_id: AccountId) -> OwnedMutexGuard<()> {
        self.handle(account_id).lock_owned().await
    }

    /// Wait for exclusive access to several accounts. Guards are taken in
    /// ascending id order so concurrent callers cannot deadlock.
    pub async fn lock_many(&self, account_ids: &[AccountId]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = account_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    /// Drop the registry entry of an account that no longer exists.
    pub fn forget(&self, account_id: AccountId) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.remove(&account_id);
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let _b = locks.lock(Uuid::new_v4()).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_many_dedups_and_forget_clears() {
        let locks = AccountLocks::new();
        let id = Uuid::new_v4();
        let guards = locks.lock_many(&[id, id]).await;
        assert_eq!(guards.len(), 1);
        drop(guards);

        locks.forget(id);
        assert_eq!(locks.len(), 0);
    }
}
