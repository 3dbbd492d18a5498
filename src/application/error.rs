use thiserror::Error;

use crate::domain::{AccountId, Cents, CustomerId, LedgerError, TransactionId, format_cents};
use crate::storage::StoreError;

/// Coarse classification of [`AppError`], used by presentation layers to pick
/// a status code or exit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InsufficientFunds,
    Concurrency,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("Customer with this email already exists: {0}")]
    DuplicateEmail(String),

    #[error(
        "Insufficient funds in account {account_id}: balance {}, requested {}",
        format_cents(*.balance),
        format_cents(*.requested)
    )]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        requested: Cents,
    },

    #[error("Concurrent update conflict: {0}")]
    Concurrency(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::InvalidAmount(_) => ErrorKind::Validation,
            AppError::CustomerNotFound(_)
            | AppError::AccountNotFound(_)
            | AppError::TransactionNotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateAccountNumber(_) | AppError::DuplicateEmail(_) => {
                ErrorKind::Conflict
            }
            AppError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AppError::Concurrency(_) => ErrorKind::Concurrency,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Translate a ledger rule violation on `account_id`.
    pub fn from_ledger(account_id: AccountId, err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount(_) => AppError::InvalidAmount(err.to_string()),
            LedgerError::InsufficientFunds { balance, requested } => AppError::InsufficientFunds {
                account_id,
                balance,
                requested,
            },
            LedgerError::Overflow => AppError::InvalidAmount(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field: "email", value } => AppError::DuplicateEmail(value),
            StoreError::Duplicate {
                field: "account number",
                value,
            } => AppError::DuplicateAccountNumber(value),
            StoreError::Duplicate { field, value } => {
                AppError::Validation(format!("duplicate {}: {}", field, value))
            }
            StoreError::BalanceChanged(account_id) => AppError::Concurrency(format!(
                "balance of account {} changed during the update",
                account_id
            )),
            StoreError::Backend(e) => AppError::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_store_duplicates_map_to_conflicts() {
        let err: AppError = StoreError::Duplicate {
            field: "account number",
            value: "00012345".into(),
        }
        .into();
        assert!(matches!(err, AppError::DuplicateAccountNumber(ref n) if n == "00012345"));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: AppError = StoreError::Duplicate {
            field: "email",
            value: "ada@example.com".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_insufficient_funds_message_formats_money() {
        let err = AppError::from_ledger(
            Uuid::nil(),
            LedgerError::InsufficientFunds {
                balance: 15000,
                requested: 20000,
            },
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(err.to_string().contains("balance 150.00, requested 200.00"));
    }

    #[test]
    fn test_balance_changed_is_concurrency() {
        let err: AppError = StoreError::BalanceChanged(Uuid::nil()).into();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
    }
}
