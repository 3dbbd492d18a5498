use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money paid into the account
    Deposit,
    /// Money taken out of the account
    Withdrawal,
    /// Money sent out of the account. Only the source side is recorded.
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Transfer => "transfer",
        }
    }

    /// Returns true if this kind decreases the account balance.
    pub fn is_debit(&self) -> bool {
        !matches!(self, TransactionKind::Deposit)
    }

    /// The balance delta this kind produces for a positive amount.
    pub fn signed_amount(&self, amount_cents: Cents) -> Cents {
        if self.is_debit() {
            -amount_cents
        } else {
            amount_cents
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" | "withdraw" => Ok(TransactionKind::Withdrawal),
            "transfer" => Ok(TransactionKind::Transfer),
            other => Err(format!(
                "unknown transaction kind '{}' (expected deposit, withdrawal or transfer)",
                other
            )),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An applied ledger event. Transactions are append-only and never mutated;
/// `balance_before`/`balance_after` pin the account balance around this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Monotonically increasing, assigned by the store. Orders transactions
    /// that share a timestamp.
    pub sequence: i64,
    pub kind: TransactionKind,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    pub description: String,
    pub balance_before: Cents,
    pub balance_after: Cents,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction record. Sequence number must be assigned by the store.
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        amount_cents: Cents,
        description: impl Into<String>,
        balance_before: Cents,
        balance_after: Cents,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            account_id,
            sequence: 0,
            kind,
            amount_cents,
            description: description.into(),
            balance_before,
            balance_after,
            timestamp: Utc::now(),
        }
    }

    /// The balance change this transaction applied.
    pub fn delta(&self) -> Cents {
        self.balance_after.saturating_sub(self.balance_before)
    }
}
