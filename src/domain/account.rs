use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CustomerId};

pub type AccountId = Uuid;

/// Minimum length of an account number.
pub const MIN_ACCOUNT_NUMBER_LEN: usize = 6;

/// A customer-owned account holding a running balance.
/// The balance only ever changes through the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    /// Unique across all accounts
    pub account_number: String,
    pub owner_name: String,
    /// Current balance in cents
    pub balance: Cents,
    /// Balance the account was opened with; the start of its transaction chain
    pub opening_balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        customer_id: CustomerId,
        account_number: impl Into<String>,
        owner_name: impl Into<String>,
        opening_balance: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            account_number: account_number.into().trim().to_string(),
            owner_name: owner_name.into().trim().to_string(),
            balance: opening_balance,
            opening_balance,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_at_opening_balance() {
        let account = Account::new(Uuid::new_v4(), " 00012345 ", "Ada Lovelace", 10000);
        assert_eq!(account.account_number, "00012345");
        assert_eq!(account.balance, 10000);
        assert_eq!(account.opening_balance, 10000);
    }
}
