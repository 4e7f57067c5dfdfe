use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use orderwallet::application::config::EngineConfig;
use orderwallet::application::engine::OrderEngine;
use orderwallet::domain::ports::{AccountStore, OrderStore, StoreHandle};
use orderwallet::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use orderwallet::infrastructure::rocksdb::RocksDBStore;
use orderwallet::interfaces::batch::run_batch;
use orderwallet::interfaces::csv::command_reader::CommandReader;
use orderwallet::interfaces::csv::report_writer::ReportWriter;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Report {
    Wallets,
    Orders,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "ORDERWALLET_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Opening balance for new coordinator accounts
    #[arg(long, env = "ORDERWALLET_COORDINATOR_GRANT", default_value = "100")]
    coordinator_grant: Decimal,

    /// Opening balance for new partner accounts
    #[arg(long, env = "ORDERWALLET_PARTNER_GRANT", default_value = "0")]
    partner_grant: Decimal,

    /// Re-validation attempts when a commit loses a version race
    #[arg(long, env = "ORDERWALLET_MAX_COMMIT_ATTEMPTS", default_value_t = 5)]
    max_commit_attempts: u32,

    /// Which table to print to stdout once the batch is done
    #[arg(long, value_enum, default_value_t = Report::Wallets)]
    report: Report,

    /// Verify every ledger and the conservation identity after the batch
    #[arg(long)]
    audit: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the CSV report, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn in_memory() -> StoreHandle {
    Arc::new(InMemoryStore::new())
}

fn open_store(db_path: Option<PathBuf>) -> Result<StoreHandle> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store: StoreHandle = Arc::new(RocksDBStore::open(&path).into_diagnostic()?);
            info!(path = %path.display(), "using RocksDB storage");
            Ok(store)
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
            );
            Ok(in_memory())
        }
        None => Ok(in_memory()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let store = open_store(cli.db_path)?;
    let config = EngineConfig {
        coordinator_grant: cli.coordinator_grant,
        partner_grant: cli.partner_grant,
        max_commit_attempts: cli.max_commit_attempts,
    };
    let engine = OrderEngine::new(Arc::clone(&store), config);

    let file = File::open(&cli.input).into_diagnostic()?;
    run_batch(&engine, CommandReader::new(file)).await;

    if cli.audit {
        let report = engine.audit().await.into_diagnostic()?;
        info!(
            accounts = report.accounts,
            orders = report.orders,
            total_balance = %report.total_balance,
            reserved = %report.reserved,
            "ledger audit passed"
        );
    }

    let stdout = io::stdout();
    match cli.report {
        Report::Wallets => {
            let accounts = store.accounts().await.into_diagnostic()?;
            ReportWriter::new(stdout.lock())
                .write_wallets(&accounts)
                .into_diagnostic()?;
        }
        Report::Orders => {
            let orders = store.orders().await.into_diagnostic()?;
            ReportWriter::new(stdout.lock())
                .write_orders(&orders)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
