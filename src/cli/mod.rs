use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::domain::{format_cents, parse_cents, Wallet};
use crate::logging;
use crate::storage::LedgerStore;

/// payledger - minimal payment ledger
#[derive(Parser)]
#[command(name = "payledger")]
#[command(about = "Wallet balances and atomic transfers over SQLite")]
#[command(version)]
pub struct Cli {
    /// TOML config file (defaults are used when omitted)
    #[arg(short, long, env = "CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Database file path, overriding the config file
    #[arg(short, long, env = "STORAGE_PATH", global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (host:port), overriding the config file
        #[arg(short, long, env = "HTTP_ADDRESS")]
        address: Option<String>,
    },

    /// Create the database and seed wallets if it is empty
    Init,

    /// List wallets and balances
    Wallets,

    /// Show the balance of a wallet
    Balance {
        /// Wallet address
        address: String,
    },

    /// Send money from one wallet to another
    Send {
        /// Source wallet address
        from: String,

        /// Destination wallet address
        to: String,

        /// Amount to send (e.g., "30" or "30.50")
        amount: String,
    },

    /// Show the most recent transactions
    History {
        /// Number of transactions to show
        #[arg(short = 'n', long, default_value = "10", allow_negative_numbers = true)]
        count: i64,
    },

    /// Verify ledger integrity
    Check,
}

impl Cli {
    /// Resolve the effective configuration: file, then command-line overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        if let Commands::Serve {
            address: Some(address),
        } = &self.command
        {
            config.http_server.address = address.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.resolve_config()?;
        logging::init(config.env);

        let store = LedgerStore::open(&config.storage, &config.seed).await?;
        let result = run_command(self.command, &store, &config).await;

        if let Err(e) = store.close().await {
            error!(error = %format!("{:#}", e), "failed to close store");
        }
        result
    }
}

async fn run_command(command: Commands, store: &LedgerStore, config: &Config) -> Result<()> {
    match command {
        Commands::Serve { .. } => run_serve(store, config).await,

        Commands::Init => {
            println!("Database ready: {}", config.storage.path.display());
            print_wallets(&store.list_wallets().await?);
            Ok(())
        }

        Commands::Wallets => {
            print_wallets(&store.list_wallets().await?);
            Ok(())
        }

        Commands::Balance { address } => {
            let wallet = store.get_balance(&address).await?;
            println!("{}: {}", wallet.address, format_cents(wallet.balance));
            Ok(())
        }

        Commands::Send { from, to, amount } => {
            let amount =
                parse_cents(&amount).context("Invalid amount format. Use '30.00' or '30'")?;
            let record = store.transfer(&from, &to, amount).await?;
            println!(
                "Sent {} {} -> {} at {}",
                format_cents(record.amount),
                record.from,
                record.to,
                record.timestamp.to_rfc3339()
            );
            Ok(())
        }

        Commands::History { count } => {
            let transactions = store.recent_transactions(count).await?;
            if transactions.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            println!(
                "{:<20} {:>12} {:<36} {:<36}",
                "TIME", "AMOUNT", "FROM", "TO"
            );
            println!("{}", "-".repeat(107));
            for tx in transactions {
                println!(
                    "{:<20} {:>12} {:<36} {:<36}",
                    tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    format_cents(tx.amount),
                    tx.from,
                    tx.to
                );
            }
            Ok(())
        }

        Commands::Check => run_check_command(store).await,
    }
}

async fn run_serve(store: &LedgerStore, config: &Config) -> Result<()> {
    let router = api::create_router(
        AppState::from_ledger(Arc::new(store.clone())),
        config.http_server.timeout(),
    );

    let listener = TcpListener::bind(&config.http_server.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_server.address))?;

    info!(env = %config.env, "starting payledger");
    api::serve(
        listener,
        router,
        api::shutdown_signal(),
        config.http_server.shutdown_timeout(),
    )
    .await
}

fn print_wallets(wallets: &[Wallet]) {
    if wallets.is_empty() {
        println!("No wallets found.");
        return;
    }

    println!("{:<36} {:>12}", "ADDRESS", "BALANCE");
    println!("{}", "-".repeat(49));
    for wallet in wallets {
        println!("{:<36} {:>12}", wallet.address, format_cents(wallet.balance));
    }
}

async fn run_check_command(store: &LedgerStore) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = store.check_integrity().await?;

    println!("Wallets:       {}", report.stats.wallet_count);
    println!("Transactions:  {}", report.stats.transaction_count);
    println!("Total balance: {}", format_cents(report.stats.total_balance));
    println!();

    if report.is_healthy() {
        println!("OK: no problems found");
        return Ok(());
    }

    for issue in &report.issues {
        println!("PROBLEM: {}", issue);
    }
    bail!("ledger integrity check failed with {} problem(s)", report.issues.len())
}
