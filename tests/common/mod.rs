// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use minibank::application::{LedgerService, ServiceConfig};
use minibank::domain::{Account, Customer, NewCustomer};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&db_path(&temp_dir), ServiceConfig::default()).await?;
    Ok((service, temp_dir))
}

/// Path of the database file inside a test directory
pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Registration input for a valid customer, unique per `email`
pub fn new_customer(email: &str) -> NewCustomer {
    NewCustomer {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        phone: "+44 20 7946 0000".into(),
        address: "12 St James's Square, London".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 12, 10).unwrap(),
    }
}

/// Test fixture: one customer owning one account
pub struct Fixture {
    pub customer: Customer,
    pub account: Account,
}

impl Fixture {
    /// Create a customer and an account with the given opening balance (cents)
    pub async fn create(service: &LedgerService, balance: i64) -> Result<Self> {
        let customer = service.create_customer(new_customer("ada@example.com")).await?;
        let account = service
            .create_account(customer.id, "00012345", balance, "Ada Lovelace")
            .await?;
        Ok(Self { customer, account })
    }
}
