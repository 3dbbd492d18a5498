mod common;

use anyhow::Result;
use common::{Fixture, db_path, test_service};
use minibank::application::{AppError, ErrorKind, LedgerService};
use minibank::domain::TransactionKind;

#[tokio::test]
async fn test_deposit_then_overdraw_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;

    let deposit = service
        .apply_transaction(account.id, TransactionKind::Deposit, 5000, Some("salary".into()))
        .await?;
    assert_eq!(deposit.balance_before, 10000);
    assert_eq!(deposit.balance_after, 15000);
    assert_eq!(deposit.description, "salary");
    assert_eq!(service.get_account(account.id).await?.balance, 15000);

    let err = service
        .apply_transaction(account.id, TransactionKind::Withdrawal, 20000, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(matches!(
        err,
        AppError::InsufficientFunds {
            balance: 15000,
            requested: 20000,
            ..
        }
    ));

    assert_eq!(service.get_account(account.id).await?.balance, 15000);
    assert_eq!(service.list_transactions_for_account(account.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_failed_transfer_leaves_no_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 2500).await?;

    let err = service
        .apply_transaction(account.id, TransactionKind::Transfer, 2501, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    assert_eq!(service.get_account(account.id).await?.balance, 2500);
    assert!(service.list_transactions().await?.is_empty());

    // Draining the account exactly is allowed.
    let transfer = service
        .apply_transaction(account.id, TransactionKind::Transfer, 2500, None)
        .await?;
    assert_eq!(transfer.balance_after, 0);

    Ok(())
}

#[tokio::test]
async fn test_balance_equals_opening_plus_signed_sum() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;

    let steps = [
        (TransactionKind::Deposit, 1234),
        (TransactionKind::Withdrawal, 999),
        (TransactionKind::Transfer, 5000),
        (TransactionKind::Deposit, 1),
        (TransactionKind::Withdrawal, 99999), // rejected
        (TransactionKind::Deposit, 75000),
        (TransactionKind::Transfer, 12345),
    ];
    for (kind, amount) in steps {
        let _ = service.apply_transaction(account.id, kind, amount, None).await;
    }

    let history = service.account_history(account.id).await?;
    assert_eq!(history.len(), 6);

    let mut expected_balance = account.opening_balance;
    for tx in &history {
        let signed = match tx.kind {
            TransactionKind::Deposit => tx.amount_cents,
            TransactionKind::Withdrawal | TransactionKind::Transfer => -tx.amount_cents,
        };
        assert_eq!(tx.balance_before, expected_balance);
        assert_eq!(tx.balance_after - tx.balance_before, signed);
        assert_eq!(tx.delta(), tx.kind.signed_amount(tx.amount_cents));
        expected_balance += signed;
    }

    let requested_sum: i64 = steps[..4]
        .iter()
        .chain(&steps[5..])
        .map(|(kind, amount)| if *kind == TransactionKind::Deposit { *amount } else { -amount })
        .sum();
    let balance = service.get_account(account.id).await?.balance;
    assert_eq!(balance, expected_balance);
    assert_eq!(balance, account.opening_balance + requested_sum);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amount_is_validation_error() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;

    for amount in [0, -100] {
        let err = service
            .apply_transaction(account.id, TransactionKind::Deposit, amount, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(service.list_transactions().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_account_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .apply_transaction(uuid::Uuid::new_v4(), TransactionKind::Deposit, 100, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .get_transaction(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_transactions_listed_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 0).await?;

    let first = service
        .apply_transaction(account.id, TransactionKind::Deposit, 100, None)
        .await?;
    let second = service
        .apply_transaction(account.id, TransactionKind::Deposit, 200, None)
        .await?;
    assert!(second.sequence > first.sequence);

    let listed = service.list_transactions().await?;
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);

    let fetched = service.get_transaction(first.id).await?;
    assert_eq!(fetched, first);

    Ok(())
}

#[tokio::test]
async fn test_unknown_accounts_leave_no_lock_entries() -> Result<()> {
    let service = LedgerService::in_memory();

    for _ in 0..100 {
        let err = service
            .apply_transaction(uuid::Uuid::new_v4(), TransactionKind::Deposit, 100, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
    assert_eq!(service.locked_account_count(), 0);

    let Fixture { customer, account } = Fixture::create(&service, 0).await?;
    service
        .apply_transaction(account.id, TransactionKind::Deposit, 100, None)
        .await?;
    assert_eq!(service.locked_account_count(), 1);

    service.delete_customer(customer.id).await?;
    assert_eq!(service.locked_account_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_commit_leaves_no_partial_state() -> Result<()> {
    let (service, temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;

    // The balance UPDATE runs first; make the transaction INSERT after it fail.
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path(&temp))).await?;
    sqlx::query(
        "CREATE TRIGGER reject_transactions BEFORE INSERT ON transactions \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    )
    .execute(&pool)
    .await?;

    let err = service
        .apply_transaction(account.id, TransactionKind::Deposit, 5000, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert_eq!(service.get_account(account.id).await?.balance, 10000);
    assert!(service.list_transactions().await?.is_empty());

    sqlx::query("DROP TRIGGER reject_transactions")
        .execute(&pool)
        .await?;
    pool.close().await;

    let tx = service
        .apply_transaction(account.id, TransactionKind::Deposit, 5000, None)
        .await?;
    assert_eq!(tx.balance_before, 10000);
    assert_eq!(tx.balance_after, 15000);
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}
