use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::LedgerService;
use crate::config::{Config, default_listen_addr};
use crate::domain::{NewCustomer, Transaction, TransactionKind, format_cents, parse_cents};

/// Minibank - a minimal banking ledger
#[derive(Parser)]
#[command(name = "minibank")]
#[command(about = "Customers, accounts and an invariant-preserving transaction ledger")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit(PostingArgs),

    /// Withdraw money from an account
    Withdraw(PostingArgs),

    /// Transfer money out of an account (debits the source account only)
    Transfer(PostingArgs),

    /// List transactions, newest first
    Transactions {
        /// Only show transactions of this account
        #[arg(long)]
        account: Option<String>,
    },

    /// Show detailed transaction information
    #[command(name = "show")]
    ShowTransaction {
        /// Transaction ID
        id: String,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    #[command(subcommand)]
    Export(ExportCommands),

    /// Serve the JSON HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MINIBANK_LISTEN")]
        listen: Option<SocketAddr>,
    },
}

#[derive(clap::Args)]
pub struct PostingArgs {
    /// Account ID
    pub account_id: String,

    /// Amount (e.g., "50.00" or "50")
    pub amount: String,

    /// Description of the transaction
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a new customer
    Create {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        address: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        date_of_birth: String,
    },

    /// List all customers
    List,

    /// Show a customer and its accounts
    Show {
        /// Customer ID
        id: String,
    },

    /// Delete a customer with all its accounts and transactions
    Delete {
        /// Customer ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account for a customer
    Create {
        /// Owning customer ID
        #[arg(long)]
        customer: String,

        /// Account number (at least 6 characters)
        #[arg(long)]
        number: String,

        /// Account owner name
        #[arg(long)]
        owner: String,

        /// Initial balance
        #[arg(long, default_value = "0")]
        balance: String,
    },

    /// List accounts
    List {
        /// Only show accounts of this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show account details
    Show {
        /// Account ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Account statement as CSV
    Statement {
        /// Account ID
        account_id: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Full database snapshot as JSON
    Snapshot {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.config.database, self.config.service_config()).await?;
                println!("Database initialized: {}", self.config.database);
            }

            Commands::Serve { listen } => {
                let service =
                    LedgerService::init(&self.config.database, self.config.service_config())
                        .await?;
                let addr = listen.unwrap_or_else(default_listen_addr);
                let listener = tokio::net::TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("Failed to bind {}", addr))?;
                crate::http::serve(listener, Arc::new(service)).await?;
            }

            Commands::Customer(cmd) => {
                let service = open_service(&self.config).await?;
                run_customer_command(&service, cmd).await?;
            }

            Commands::Account(cmd) => {
                let service = open_service(&self.config).await?;
                run_account_command(&service, cmd).await?;
            }

            Commands::Deposit(args) => {
                let service = open_service(&self.config).await?;
                run_posting_command(&service, TransactionKind::Deposit, args).await?;
            }

            Commands::Withdraw(args) => {
                let service = open_service(&self.config).await?;
                run_posting_command(&service, TransactionKind::Withdrawal, args).await?;
            }

            Commands::Transfer(args) => {
                let service = open_service(&self.config).await?;
                run_posting_command(&service, TransactionKind::Transfer, args).await?;
            }

            Commands::Transactions { account } => {
                let service = open_service(&self.config).await?;
                run_transactions_command(&service, account).await?;
            }

            Commands::ShowTransaction { id } => {
                let service = open_service(&self.config).await?;
                let transaction_id = parse_id(&id, "transaction")?;
                run_show_transaction_command(&service, transaction_id).await?;
            }

            Commands::Check => {
                let service = open_service(&self.config).await?;
                run_check_command(&service).await?;
            }

            Commands::Export(cmd) => {
                let service = open_service(&self.config).await?;
                run_export_command(&service, cmd).await?;
            }
        }

        Ok(())
    }
}

async fn open_service(config: &Config) -> Result<LedgerService> {
    LedgerService::connect(&config.database, config.service_config())
        .await
        .with_context(|| {
            format!(
                "Cannot open database '{}'. Run `minibank init` first",
                config.database
            )
        })
}

async fn run_customer_command(service: &LedgerService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Create {
            first_name,
            last_name,
            email,
            phone,
            address,
            date_of_birth,
        } => {
            let date_of_birth = NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d")
                .context("Date of birth must be in YYYY-MM-DD format")?;

            let customer = service
                .create_customer(NewCustomer {
                    first_name,
                    last_name,
                    email,
                    phone,
                    address,
                    date_of_birth,
                })
                .await?;
            println!("Created customer: {} ({})", customer.full_name(), customer.id);
        }

        CustomerCommands::List => {
            let customers = service.list_customers().await?;
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<38} {:<25} EMAIL", "ID", "NAME");
                println!("{}", "-".repeat(90));
                for customer in &customers {
                    println!(
                        "{:<38} {:<25} {}",
                        customer.id,
                        truncate(&customer.full_name(), 25),
                        customer.email
                    );
                }
            }
        }

        CustomerCommands::Show { id } => {
            let info = service.get_customer_info(parse_id(&id, "customer")?).await?;
            let customer = &info.customer;

            println!("Customer: {}", customer.full_name());
            println!("  ID:            {}", customer.id);
            println!("  Email:         {}", customer.email);
            println!("  Phone:         {}", customer.phone);
            println!("  Address:       {}", customer.address);
            println!("  Date of birth: {}", customer.date_of_birth);
            println!(
                "  Registered:    {}",
                customer.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            if info.accounts.is_empty() {
                println!("  No accounts.");
            } else {
                println!("  Accounts:");
                for account in &info.accounts {
                    println!(
                        "    {:<16} {:>14}  ({})",
                        account.account_number,
                        format_cents(account.balance),
                        account.id
                    );
                }
            }
        }

        CustomerCommands::Delete { id } => {
            let customer = service.delete_customer(parse_id(&id, "customer")?).await?;
            println!("Deleted customer: {} ({})", customer.full_name(), customer.id);
        }
    }
    Ok(())
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            customer,
            number,
            owner,
            balance,
        } => {
            let customer_id = parse_id(&customer, "customer")?;
            let balance_cents =
                parse_cents(&balance).context("Invalid balance format. Use '50.00' or '50'")?;

            let account = service
                .create_account(customer_id, &number, balance_cents, &owner)
                .await?;
            println!(
                "Created account: {} with balance {} ({})",
                account.account_number,
                format_cents(account.balance),
                account.id
            );
        }

        AccountCommands::List { customer } => {
            let accounts = match customer {
                Some(id) => {
                    service
                        .list_accounts_for_customer(parse_id(&id, "customer")?)
                        .await?
                }
                None => service.list_accounts().await?,
            };

            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<38} {:<16} {:<20} {:>14}",
                    "ID", "NUMBER", "OWNER", "BALANCE"
                );
                println!("{}", "-".repeat(91));
                for account in &accounts {
                    println!(
                        "{:<38} {:<16} {:<20} {:>14}",
                        account.id,
                        truncate(&account.account_number, 16),
                        truncate(&account.owner_name, 20),
                        format_cents(account.balance)
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let info = service.get_account_info(parse_id(&id, "account")?).await?;
            let account = &info.account;

            println!("Account: {}", account.account_number);
            println!("  ID:              {}", account.id);
            println!("  Customer:        {}", account.customer_id);
            println!("  Owner:           {}", account.owner_name);
            println!("  Balance:         {}", format_cents(account.balance));
            println!("  Opening balance: {}", format_cents(account.opening_balance));
            println!(
                "  Opened:          {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Transactions:    {}", info.transaction_count);
            if let Some(last) = info.last_activity {
                println!("  Last activity:   {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_posting_command(
    service: &LedgerService,
    kind: TransactionKind,
    args: PostingArgs,
) -> Result<()> {
    let account_id = parse_id(&args.account_id, "account")?;
    let amount_cents =
        parse_cents(&args.amount).context("Invalid amount format. Use '50.00' or '50'")?;

    let transaction = service
        .apply_transaction(account_id, kind, amount_cents, args.description)
        .await?;

    println!(
        "Recorded {}: {} (balance {} -> {}) ({})",
        transaction.kind,
        format_cents(transaction.amount_cents),
        format_cents(transaction.balance_before),
        format_cents(transaction.balance_after),
        transaction.id
    );
    Ok(())
}

async fn run_transactions_command(service: &LedgerService, account: Option<String>) -> Result<()> {
    let transactions = match account {
        Some(id) => {
            service
                .list_transactions_for_account(parse_id(&id, "account")?)
                .await?
        }
        None => service.list_transactions().await?,
    };

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<11} {:>12} {:>14} {:<38} DESCRIPTION",
        "DATE", "KIND", "AMOUNT", "BALANCE", "ACCOUNT"
    );
    println!("{}", "-".repeat(110));
    for tx in &transactions {
        print_transaction_row(tx);
    }
    Ok(())
}

fn print_transaction_row(tx: &Transaction) {
    println!(
        "{:<20} {:<11} {:>12} {:>14} {:<38} {}",
        tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
        tx.kind,
        format_cents(tx.delta()),
        format_cents(tx.balance_after),
        tx.account_id,
        truncate(&tx.description, 30)
    );
}

async fn run_show_transaction_command(service: &LedgerService, id: Uuid) -> Result<()> {
    let tx = service.get_transaction(id).await?;
    let account = service.get_account(tx.account_id).await?;

    println!("Transaction: {}", tx.id);
    println!("  Sequence:       {}", tx.sequence);
    println!("  Date:           {}", tx.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("  Kind:           {}", tx.kind);
    println!("  Amount:         {}", format_cents(tx.amount_cents));
    println!(
        "  Account:        {} ({})",
        account.account_number, account.id
    );
    println!("  Balance before: {}", format_cents(tx.balance_before));
    println!("  Balance after:  {}", format_cents(tx.balance_after));
    if !tx.description.is_empty() {
        println!("  Description:    {}", tx.description);
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Customers:    {}", report.customer_count);
    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!("Total held:   {}", format_cents(report.total_balance));
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(service: &LedgerService, cmd: ExportCommands) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let open = |output: Option<&str>| -> Result<Box<dyn Write>> {
        Ok(match output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path))?;
                Box::new(file)
            }
            None => Box::new(stdout()),
        })
    };

    match cmd {
        ExportCommands::Statement { account_id, output } => {
            let account_id = parse_id(&account_id, "account")?;
            let writer = open(output.as_deref())?;
            let count = exporter.export_statement_csv(account_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        ExportCommands::Snapshot { output } => {
            let writer = open(output.as_deref())?;
            let snapshot = exporter.export_snapshot_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} customers, {} accounts, {} transactions",
                    snapshot.customers.len(),
                    snapshot.accounts.len(),
                    snapshot.transactions.len()
                );
            }
        }
    }

    Ok(())
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_posting_command() {
        let cli = Cli::try_parse_from([
            "minibank",
            "--database",
            "bank.db",
            "withdraw",
            "6f1c1f4e-2b4e-4b8e-9a57-5c1f8d9b2a10",
            "25.50",
            "-d",
            "rent",
        ])
        .unwrap();
        assert_eq!(cli.config.database, "bank.db");
        match cli.command {
            Commands::Withdraw(args) => {
                assert_eq!(args.amount, "25.50");
                assert_eq!(args.description.as_deref(), Some("rent"));
            }
            _ => panic!("expected withdraw"),
        }
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Zoë Ångström-Lindqvist", 10), "Zoë Ång...");
    }
}
