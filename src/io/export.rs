use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, AccountId, Customer, Transaction, format_cents};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub customers: Vec<Customer>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the statement of one account to CSV, oldest transaction first.
    pub async fn export_statement_csv<W: Write>(
        &self,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize> {
        let account = self.service.get_account(account_id).await?;
        let history = self.service.account_history(account_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "timestamp",
            "transaction_id",
            "account_number",
            "kind",
            "amount",
            "balance_before",
            "balance_after",
            "description",
        ])?;

        for tx in &history {
            csv_writer.write_record([
                tx.sequence.to_string(),
                tx.timestamp.to_rfc3339(),
                tx.id.to_string(),
                account.account_number.clone(),
                tx.kind.to_string(),
                format_cents(tx.delta()),
                format_cents(tx.balance_before),
                format_cents(tx.balance_after),
                tx.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(history.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let customers = self.service.list_customers().await?;
        let accounts = self.service.list_accounts().await?;
        let mut transactions = self.service.list_transactions().await?;
        transactions.reverse();

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            customers,
            accounts,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
