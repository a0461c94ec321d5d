#![forbid(unsafe_code)]
//! SecureChain API server.
//!
//! Serves the transaction/ledger REST API and retrains the anomaly model on
//! a fixed interval in the background; submissions always score against the
//! last committed snapshot.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use securechain::api::{run_api_server, AppState};
use securechain::clock::SystemClock;
use securechain::config::load_config;
use securechain::persistence::Database;
use securechain::store::TransactionStore;

#[derive(Parser)]
#[command(name = "securechain-server", about = "SecureChain transaction ledger API server")]
struct Args {
    /// Port to listen on (overrides config.toml)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path (overrides config.toml)
    #[arg(short, long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = load_config()?;
    if let Some(port) = args.port {
        config.server.api_port = port;
    }
    if let Some(db) = args.db {
        config.database.path = db;
    }

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let database = Database::open(&config.database.path)?;
    let port = config.server.api_port;
    let retrain_interval = Duration::from_secs(config.model.retrain_interval_secs);

    let store = Arc::new(TransactionStore::open(
        Box::new(database),
        Box::new(SystemClock),
        config,
    )?);

    let report = store.validate_chain();
    if report.valid {
        info!(blocks = report.total_blocks, "ledger loaded and verified");
    } else {
        // Startup continues; the findings stay queryable via /api/chain/validate.
        error!(errors = report.errors.len(), "ledger failed integrity audit at startup");
        for issue in &report.errors {
            error!(index = issue.index, reason = %issue.reason, "integrity finding");
        }
    }

    // Periodic background retraining, decoupled from the request path.
    let trainer_store = store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retrain_interval);
        loop {
            ticker.tick().await;
            let committed = tokio::task::block_in_place(|| trainer_store.retrain());
            if !committed && trainer_store.transaction_count() > 0 {
                warn!("retraining skipped, scoring stays rule-based");
            }
        }
    });

    run_api_server(AppState::new(store), port).await
}
