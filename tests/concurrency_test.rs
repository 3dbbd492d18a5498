mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{Fixture, db_path, test_service};
use minibank::application::{AppError, ErrorKind, LedgerService, ServiceConfig};
use minibank::domain::{AccountId, TransactionKind};

async fn race_withdrawals(
    services: [Arc<LedgerService>; 2],
    account_id: AccountId,
) -> Vec<Result<(), AppError>> {
    let handles: Vec<_> = services
        .into_iter()
        .map(|service| {
            tokio::spawn(async move {
                service
                    .apply_transaction(account_id, TransactionKind::Withdrawal, 6000, None)
                    .await
                    .map(|_| ())
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

fn assert_exactly_one_succeeded(results: &[Result<(), AppError>]) {
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "{:?}", results);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds, "{}", err);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_on_sqlite() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;
    let service = Arc::new(service);

    let results = race_withdrawals([service.clone(), service.clone()], account.id).await;
    assert_exactly_one_succeeded(&results);

    assert_eq!(service.get_account(account.id).await?.balance, 4000);
    assert_eq!(service.list_transactions_for_account(account.id).await?.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_in_memory() -> Result<()> {
    let service = LedgerService::in_memory();
    let Fixture { account, .. } = Fixture::create(&service, 10000).await?;
    let service = Arc::new(service);

    let results = race_withdrawals([service.clone(), service.clone()], account.id).await;
    assert_exactly_one_succeeded(&results);

    assert_eq!(service.get_account(account.id).await?.balance, 4000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_services_sharing_a_database_do_not_lose_updates() -> Result<()> {
    let (first, temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&first, 10000).await?;
    let second = LedgerService::connect(&db_path(&temp), ServiceConfig::default()).await?;

    // Separate services have separate lock registries; only the store's
    // compare-and-set stands between them.
    let results = race_withdrawals([Arc::new(first), Arc::new(second)], account.id).await;
    assert_exactly_one_succeeded(&results);

    let check = LedgerService::connect(&db_path(&temp), ServiceConfig::default()).await?;
    assert_eq!(check.get_account(account.id).await?.balance, 4000);
    assert!(check.check_integrity().await?.is_healthy());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_deposits_all_apply() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let Fixture { account, .. } = Fixture::create(&service, 0).await?;
    let service = Arc::new(service);

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .apply_transaction(account.id, TransactionKind::Deposit, 150, None)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    assert_eq!(service.get_account(account.id).await?.balance, 3000);
    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{:?}", report.issues);
    assert_eq!(report.transaction_count, 20);

    Ok(())
}
