use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Instrument};

use crate::api::{self, HttpSettings};
use crate::application::AccountService;
use crate::domain::{format_cents, parse_cents};
use crate::storage::PoolSettings;
use crate::telemetry::{self, LogSettings};

/// Saldo - account balance service
#[derive(Parser, Debug)]
#[command(name = "saldo")]
#[command(about = "A small account-balance service with an atomic credit/debit ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, global = true, env = "SALDO_DATABASE", default_value = "saldo.db")]
    pub database: String,

    /// Default log filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "SALDO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "SALDO_LOG_JSON")]
    pub log_json: bool,

    /// Write JSON logs to this file (rotated daily) instead of stdout
    #[arg(long, global = true, env = "SALDO_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Service name attached to every log record
    #[arg(long, global = true, env = "SALDO_SERVICE_NAME", default_value = "saldo")]
    pub service_name: String,

    /// Maximum pooled database connections
    #[arg(long, global = true, env = "SALDO_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Seconds a writer waits on a locked database before failing
    #[arg(long, global = true, env = "SALDO_BUSY_TIMEOUT_SECS", default_value_t = 5)]
    pub busy_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "SALDO_LISTEN", default_value = "127.0.0.1:8080")]
        listen: String,

        /// Per-request timeout in seconds
        #[arg(long, env = "SALDO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
        request_timeout_secs: u64,
    },

    /// Create a user account
    CreateUser {
        username: String,

        /// Opening balance (e.g., "100.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// Show a user's balance
    Balance { username: String },

    /// Add funds to a user's account
    Credit {
        username: String,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Take funds from a user's account
    Debit {
        username: String,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// List a user's transactions, newest first
    History {
        username: String,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<i64>,
    },
}

impl Cli {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_secs(self.busy_timeout_secs),
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log_level.clone(),
            json: self.log_json,
            file: self.log_file.clone(),
            service_name: self.service_name.clone(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let log_settings = self.log_settings();
        let _guard = telemetry::init(&log_settings);

        self.execute()
            .instrument(telemetry::service_span(&log_settings.service_name))
            .await
    }

    async fn execute(self) -> Result<()> {
        let service = AccountService::init(&self.database, &self.pool_settings())
            .await
            .with_context(|| format!("Failed to open database {}", self.database))?;

        match self.command {
            Commands::Serve {
                listen,
                request_timeout_secs,
            } => {
                let settings = HttpSettings {
                    request_timeout: Duration::from_secs(request_timeout_secs),
                    service_name: self.service_name.clone(),
                };
                serve(service, &listen, &settings).await?;
            }

            Commands::CreateUser { username, balance } => {
                let balance =
                    parse_cents(&balance).context("Invalid balance format. Use '50.00' or '50'")?;
                let account = service.create_account(balance, &username).await?;
                println!(
                    "Created user {} (id {}) with balance {}",
                    account.username,
                    account.id,
                    format_cents(account.balance)
                );
            }

            Commands::Balance { username } => {
                let account = service.get_account(&username).await?;
                println!("{}: {}", account.username, format_cents(account.balance));
            }

            Commands::Credit { username, amount } => {
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let (account, result) = service.credit(&username, amount).await?;
                println!(
                    "Credited {} to {} (transaction {}), new balance {}",
                    format_cents(amount),
                    account.username,
                    result.transaction.id,
                    format_cents(result.new_balance)
                );
            }

            Commands::Debit { username, amount } => {
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let (account, result) = service.debit(&username, amount).await?;
                println!(
                    "Debited {} from {} (transaction {}), new balance {}",
                    format_cents(amount),
                    account.username,
                    result.transaction.id,
                    format_cents(result.new_balance)
                );
            }

            Commands::History { username, limit } => {
                let account = service.get_account(&username).await?;
                let transactions = service.list_transactions(&account, limit).await?;
                if transactions.is_empty() {
                    println!("No transactions for {}", account.username);
                }
                for trx in transactions {
                    println!(
                        "#{:<6} {}  {:<6} {:>12}",
                        trx.id,
                        trx.created_at.format("%Y-%m-%d %H:%M:%S"),
                        trx.kind,
                        format_cents(trx.amount)
                    );
                }
            }
        }

        Ok(())
    }
}

async fn serve(service: AccountService, listen: &str, settings: &HttpSettings) -> Result<()> {
    let repo = service.repository().clone();
    let app = api::build_app(service, settings);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server exited with an error")?;

    repo.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["saldo", "serve"]).unwrap();
        assert_eq!(cli.max_connections, 10);
        assert_eq!(cli.pool_settings().busy_timeout, Duration::from_secs(5));
        match cli.command {
            Commands::Serve {
                request_timeout_secs,
                ..
            } => assert_eq!(request_timeout_secs, 30),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_file_and_service_name() {
        let cli = Cli::try_parse_from([
            "saldo",
            "balance",
            "alice",
            "--log-file",
            "/var/log/saldo/saldo.log",
            "--service-name",
            "saldo-eu",
        ])
        .unwrap();
        let settings = cli.log_settings();
        assert_eq!(settings.file, Some(PathBuf::from("/var/log/saldo/saldo.log")));
        assert_eq!(settings.service_name, "saldo-eu");
        assert!(!settings.json);
    }

    #[test]
    fn test_parse_debit_with_global_database() {
        let cli =
            Cli::try_parse_from(["saldo", "debit", "bob", "10.00", "--database", "x.db"]).unwrap();
        assert_eq!(cli.database, "x.db");
        assert!(matches!(
            cli.command,
            Commands::Debit { ref username, ref amount } if username == "bob" && amount == "10.00"
        ));
    }
}
