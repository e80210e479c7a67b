use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::{CascadePolicy, LedgerService, ServiceConfig};
use crate::domain::{NewTransaction, NewUser, TransactionId, UserId};
use crate::storage::StoreConfig;

/// Venmo Ledger - peer-to-peer balance transfers
#[derive(Parser)]
#[command(name = "venmo-ledger")]
#[command(about = "Send, request and settle balance transfers between users")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "venmo.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// When deleting a user, also delete the transactions it received
    #[arg(long, global = true)]
    pub full_cascade: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Transaction commands
    #[command(subcommand)]
    #[command(name = "tx")]
    Transaction(TransactionCommands),
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Create {
        /// Display name
        name: String,

        /// Handle
        username: String,

        /// Starting balance
        #[arg(short, long)]
        balance: Option<i64>,
    },

    /// List all users
    List,

    /// Show a user and its transactions
    Show {
        /// User ID
        id: UserId,
    },

    /// Delete a user
    Delete {
        /// User ID
        id: UserId,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Pay another user; funds move immediately
    Send {
        /// Amount to transfer
        amount: i64,

        /// Sender user ID
        #[arg(long)]
        from: UserId,

        /// Receiver user ID
        #[arg(long)]
        to: UserId,

        /// Message attached to the transaction
        #[arg(short, long)]
        message: String,
    },

    /// Propose a transfer that waits for a decision
    Request {
        /// Amount to transfer
        amount: i64,

        /// Sender user ID
        #[arg(long)]
        from: UserId,

        /// Receiver user ID
        #[arg(long)]
        to: UserId,

        /// Message attached to the transaction
        #[arg(short, long)]
        message: String,
    },

    /// Show a transaction
    Show {
        /// Transaction ID
        id: TransactionId,
    },

    /// Accept a pending transaction and settle it
    Accept {
        /// Transaction ID
        id: TransactionId,
    },

    /// Decline a pending transaction
    Decline {
        /// Transaction ID
        id: TransactionId,
    },
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::in_file(&self.database)
    }

    fn service_config(&self) -> ServiceConfig {
        let cascade = if self.full_cascade {
            CascadePolicy::Full
        } else {
            CascadePolicy::SenderOnly
        };
        ServiceConfig::default().with_cascade(cascade)
    }

    pub async fn run(self) -> Result<()> {
        let store = self.store_config();
        let config = self.service_config();

        match self.command {
            Commands::Init => {
                LedgerService::init(&store, config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::User(user_cmd) => {
                let service = LedgerService::connect(&store, config).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Transaction(txn_cmd) => {
                let service = LedgerService::connect(&store, config).await?;
                run_transaction_command(&service, txn_cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Create {
            name,
            username,
            balance,
        } => {
            let mut new_user = NewUser::new(name, username);
            if let Some(balance) = balance {
                new_user = new_user.with_balance(balance);
            }
            print_json(&service.create_user(new_user).await?)
        }

        UserCommands::List => print_json(&service.list_users().await?),

        UserCommands::Show { id } => print_json(&service.get_user(id).await?),

        UserCommands::Delete { id } => print_json(&service.delete_user(id).await?),
    }
}

async fn run_transaction_command(service: &LedgerService, cmd: TransactionCommands) -> Result<()> {
    match cmd {
        TransactionCommands::Send {
            amount,
            from,
            to,
            message,
        } => {
            let txn = service
                .create_transaction(NewTransaction::payment(from, to, amount, message))
                .await?;
            print_json(&txn)
        }

        TransactionCommands::Request {
            amount,
            from,
            to,
            message,
        } => {
            let txn = service
                .create_transaction(NewTransaction::request(from, to, amount, message))
                .await?;
            print_json(&txn)
        }

        TransactionCommands::Show { id } => print_json(&service.get_transaction(id).await?),

        TransactionCommands::Accept { id } => {
            print_json(&service.accept_transaction(id).await?)
        }

        TransactionCommands::Decline { id } => {
            print_json(&service.decline_transaction(id).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
