use std::fmt;

use super::{Account, AccountId, Cents, Transaction, TransactionId, TransactionKind};

/// Compute the balance an account will hold after applying a transaction.
///
/// Deposits always succeed (barring overflow). Withdrawals and transfers
/// require the current balance to cover the amount.
pub fn compute_balance_after(
    kind: TransactionKind,
    balance_before: Cents,
    amount_cents: Cents,
) -> Result<Cents, LedgerError> {
    if amount_cents <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount_cents));
    }

    match kind {
        TransactionKind::Deposit => balance_before
            .checked_add(amount_cents)
            .ok_or(LedgerError::Overflow),
        TransactionKind::Withdrawal | TransactionKind::Transfer => {
            if amount_cents > balance_before {
                return Err(LedgerError::InsufficientFunds {
                    balance: balance_before,
                    requested: amount_cents,
                });
            }
            Ok(balance_before - amount_cents)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    NonPositiveAmount(Cents),
    InsufficientFunds { balance: Cents, requested: Cents },
    Overflow,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {} cents", amount)
            }
            LedgerError::InsufficientFunds { balance, requested } => write!(
                f,
                "insufficient funds: balance {} cents, requested {} cents",
                balance, requested
            ),
            LedgerError::Overflow => write!(f, "resulting balance is out of range"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Sort transactions into chain order: oldest first, sequence breaks ties.
pub fn sort_chain(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.sequence.cmp(&b.sequence))
    });
}

/// Replay the balance of an account from its opening balance and history.
pub fn replay_balance(
    opening_balance: Cents,
    transactions: &[Transaction],
) -> Result<Cents, LedgerError> {
    transactions.iter().try_fold(opening_balance, |balance, t| {
        if t.amount_cents <= 0 {
            return Err(LedgerError::NonPositiveAmount(t.amount_cents));
        }
        balance
            .checked_add(t.kind.signed_amount(t.amount_cents))
            .ok_or(LedgerError::Overflow)
    })
}

/// A break in an account's balance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    NonPositiveAmount {
        transaction_id: TransactionId,
        amount: Cents,
    },
    WrongDelta {
        transaction_id: TransactionId,
        expected: i128,
        actual: i128,
    },
    BrokenLink {
        transaction_id: TransactionId,
        expected_before: Cents,
        actual_before: Cents,
    },
    ForeignTransaction {
        transaction_id: TransactionId,
        account_id: AccountId,
    },
    BalanceMismatch {
        expected: Cents,
        actual: Cents,
    },
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIssue::NonPositiveAmount {
                transaction_id,
                amount,
            } => write!(
                f,
                "transaction {} has non-positive amount {}",
                transaction_id, amount
            ),
            ChainIssue::WrongDelta {
                transaction_id,
                expected,
                actual,
            } => write!(
                f,
                "transaction {} changed balance by {} instead of {}",
                transaction_id, actual, expected
            ),
            ChainIssue::BrokenLink {
                transaction_id,
                expected_before,
                actual_before,
            } => write!(
                f,
                "transaction {} starts at {} but previous balance was {}",
                transaction_id, actual_before, expected_before
            ),
            ChainIssue::ForeignTransaction {
                transaction_id,
                account_id,
            } => write!(
                f,
                "transaction {} belongs to account {}",
                transaction_id, account_id
            ),
            ChainIssue::BalanceMismatch { expected, actual } => write!(
                f,
                "account balance is {} but history ends at {}",
                actual, expected
            ),
        }
    }
}

/// Verify the balance chain of one account. `transactions` must be in chain
/// order (see [`sort_chain`]).
pub fn verify_chain(account: &Account, transactions: &[Transaction]) -> Vec<ChainIssue> {
    let mut issues = Vec::new();
    let mut running = account.opening_balance;

    for t in transactions {
        if t.account_id != account.id {
            issues.push(ChainIssue::ForeignTransaction {
                transaction_id: t.id,
                account_id: t.account_id,
            });
            continue;
        }
        if t.amount_cents <= 0 {
            issues.push(ChainIssue::NonPositiveAmount {
                transaction_id: t.id,
                amount: t.amount_cents,
            });
        }
        if t.balance_before != running {
            issues.push(ChainIssue::BrokenLink {
                transaction_id: t.id,
                expected_before: running,
                actual_before: t.balance_before,
            });
        }
        // Widened: tampered rows may hold any i64 pair.
        let expected_delta = if t.kind.is_debit() {
            -i128::from(t.amount_cents)
        } else {
            i128::from(t.amount_cents)
        };
        let actual_delta = i128::from(t.balance_after) - i128::from(t.balance_before);
        if actual_delta != expected_delta {
            issues.push(ChainIssue::WrongDelta {
                transaction_id: t.id,
                expected: expected_delta,
                actual: actual_delta,
            });
        }
        running = t.balance_after;
    }

    if running != account.balance {
        issues.push(ChainIssue::BalanceMismatch {
            expected: running,
            actual: account.balance,
        });
    }

    issues
}

/// Result of a ledger-wide integrity check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub customer_count: usize,
    pub account_count: usize,
    pub transaction_count: usize,
    /// Sum of all account balances, widened so it cannot overflow.
    pub total_balance: i128,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fold the chain issues of one account into the report.
    pub fn record_account(&mut self, account: &Account, issues: Vec<ChainIssue>) {
        self.total_balance += i128::from(account.balance);
        self.issues.extend(
            issues
                .into_iter()
                .map(|issue| format!("account {}: {}", account.account_number, issue)),
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::domain::format_cents;

    fn apply(account: &mut Account, kind: TransactionKind, amount: Cents) -> Transaction {
        let after = compute_balance_after(kind, account.balance, amount).unwrap();
        let t = Transaction::new(account.id, kind, amount, "", account.balance, after);
        account.balance = after;
        t
    }

    #[test]
    fn test_deposit_adds_amount() {
        assert_eq!(
            compute_balance_after(TransactionKind::Deposit, 10000, 5000),
            Ok(15000)
        );
    }

    #[test]
    fn test_withdrawal_exact_balance() {
        assert_eq!(
            compute_balance_after(TransactionKind::Withdrawal, 10000, 10000),
            Ok(0)
        );
    }

    #[test]
    fn test_withdrawal_insufficient_funds() {
        assert_eq!(
            compute_balance_after(TransactionKind::Withdrawal, 15000, 20000),
            Err(LedgerError::InsufficientFunds {
                balance: 15000,
                requested: 20000
            })
        );
    }

    #[test]
    fn test_transfer_checks_funds_like_withdrawal() {
        assert_eq!(
            compute_balance_after(TransactionKind::Transfer, 10000, 6000),
            Ok(4000)
        );
        assert!(matches!(
            compute_balance_after(TransactionKind::Transfer, 100, 101),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert_eq!(
            compute_balance_after(TransactionKind::Deposit, 0, 0),
            Err(LedgerError::NonPositiveAmount(0))
        );
        assert_eq!(
            compute_balance_after(TransactionKind::Withdrawal, 100, -5),
            Err(LedgerError::NonPositiveAmount(-5))
        );
    }

    #[test]
    fn test_deposit_overflow() {
        assert_eq!(
            compute_balance_after(TransactionKind::Deposit, i64::MAX, 1),
            Err(LedgerError::Overflow)
        );
    }

    #[test]
    fn test_valid_chain_has_no_issues() {
        let mut account = Account::new(Uuid::new_v4(), "00012345", "Ada", 10000);
        let history = vec![
            apply(&mut account, TransactionKind::Deposit, 5000),
            apply(&mut account, TransactionKind::Withdrawal, 2500),
            apply(&mut account, TransactionKind::Transfer, 1000),
        ];

        assert!(verify_chain(&account, &history).is_empty());
        assert_eq!(replay_balance(account.opening_balance, &history), Ok(11500));
        assert_eq!(account.balance, 11500);
    }

    #[test]
    fn test_broken_link_detected() {
        let mut account = Account::new(Uuid::new_v4(), "00012345", "Ada", 10000);
        let mut history = vec![
            apply(&mut account, TransactionKind::Deposit, 5000),
            apply(&mut account, TransactionKind::Deposit, 5000),
        ];
        history[1].balance_before += 1;
        history[1].balance_after += 1;
        account.balance += 1;

        let issues = verify_chain(&account, &history);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], ChainIssue::BrokenLink { .. }));
    }

    #[test]
    fn test_balance_mismatch_detected() {
        let mut account = Account::new(Uuid::new_v4(), "00012345", "Ada", 10000);
        let history = vec![apply(&mut account, TransactionKind::Deposit, 5000)];
        account.balance = 99;

        let issues = verify_chain(&account, &history);
        assert_eq!(
            issues,
            vec![ChainIssue::BalanceMismatch {
                expected: 15000,
                actual: 99
            }]
        );
    }

    #[test]
    fn test_wrong_delta_detected() {
        let mut account = Account::new(Uuid::new_v4(), "00012345", "Ada", 10000);
        let mut history = vec![apply(&mut account, TransactionKind::Withdrawal, 1000)];
        history[0].kind = TransactionKind::Deposit;

        let issues = verify_chain(&account, &history);
        assert!(matches!(issues[0], ChainIssue::WrongDelta { .. }));
    }

    #[test]
    fn test_sort_chain_uses_sequence_for_ties() {
        let account_id = Uuid::new_v4();
        let now = Utc::now();
        let mut a = Transaction::new(account_id, TransactionKind::Deposit, 1, "", 0, 1);
        let mut b = Transaction::new(account_id, TransactionKind::Deposit, 1, "", 1, 2);
        let mut c = Transaction::new(account_id, TransactionKind::Deposit, 1, "", 2, 3);
        a.timestamp = now;
        a.sequence = 2;
        b.timestamp = now;
        b.sequence = 1;
        c.timestamp = now - Duration::seconds(1);
        c.sequence = 3;

        let mut chain = vec![a.clone(), b.clone(), c.clone()];
        sort_chain(&mut chain);
        assert_eq!(
            chain.iter().map(|t| t.sequence).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn test_report_total_does_not_overflow() {
        let half = i64::MAX / 2 + 1;
        let a = Account::new(Uuid::new_v4(), "00012345", "Ada", half);
        let b = Account::new(Uuid::new_v4(), "00067890", "Grace", half);

        let mut report = IntegrityReport::default();
        report.record_account(&a, verify_chain(&a, &[]));
        report.record_account(&b, verify_chain(&b, &[]));

        assert!(report.is_healthy());
        assert_eq!(report.total_balance, 2 * i128::from(half));
        assert_eq!(format_cents(report.total_balance), "92233720368547758.08");
    }

    #[test]
    fn test_replay_balance_reports_overflow() {
        let account_id = Uuid::new_v4();
        let deposit = Transaction::new(account_id, TransactionKind::Deposit, 10, "", 0, 10);
        assert_eq!(replay_balance(i64::MAX - 5, &[deposit]), Err(LedgerError::Overflow));
    }

    #[test]
    fn test_tampered_extreme_delta_is_reported() {
        let mut account = Account::new(Uuid::new_v4(), "00012345", "Ada", 0);
        let mut t = Transaction::new(account.id, TransactionKind::Deposit, 1, "", 0, 1);
        t.balance_before = i64::MIN;
        t.balance_after = i64::MAX;
        account.balance = i64::MAX;

        let issues = verify_chain(&account, &[t]);
        assert!(issues.iter().any(|i| matches!(i, ChainIssue::WrongDelta { .. })));
    }
}
