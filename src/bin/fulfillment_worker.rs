//! # Fulfillment Worker
//!
//! Runs the fulfillment worker pool against Postgres: applies migrations, re-queues
//! orders left in `processing` by a previous process, then drains the queue until
//! Ctrl-C.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use fulfillment_core::config::FulfillmentConfig;
use fulfillment_core::delivery::{HttpMailer, StripeClient};
use fulfillment_core::logging::init_structured_logging;
use fulfillment_core::orchestration::{FulfillmentOrchestrator, FulfillmentWorkerPool};
use fulfillment_core::store::PgStore;

#[derive(Parser)]
#[command(name = "fulfillment-worker")]
#[command(about = "Fulfill confirmed dataset orders in the background")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// TOML configuration file layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of concurrent fulfillment runs
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip applying database migrations on startup
    #[arg(long)]
    skip_migrations: bool,

    /// Validate configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = FulfillmentConfig::load(cli.config.as_deref())
        .context("failed to load fulfillment configuration")?;
    if let Some(workers) = cli.workers {
        config.worker.workers = workers;
        config.validate()?;
    }

    if cli.check {
        println!("Configuration OK");
        println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
        return Ok(());
    }

    init_structured_logging();
    let config = Arc::new(config);

    let store = Arc::new(
        PgStore::connect(&config)
            .await
            .context("failed to connect to the database")?,
    );
    if !cli.skip_migrations {
        store.migrate().await.context("failed to apply migrations")?;
    }

    let orchestrator = Arc::new(FulfillmentOrchestrator::new(
        Arc::clone(&config),
        store.clone(),
        store.clone(),
        Arc::new(HttpMailer::new(&config.delivery)?),
        Arc::new(StripeClient::new(&config.payment)?),
    ));

    let pool = FulfillmentWorkerPool::start(orchestrator, store.clone(), &config.worker);
    let recovered = pool.recover_stalled(store.as_ref()).await?;
    info!(recovered, workers = config.worker.workers, "Fulfillment worker running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    pool.shutdown().await?;
    store.close().await;
    Ok(())
}

/// Copy of the configuration safe to print
fn redacted(config: &FulfillmentConfig) -> FulfillmentConfig {
    let mut shown = config.clone();
    let hide = |value: &mut String| {
        if !value.is_empty() {
            *value = "********".to_string();
        }
    };
    hide(&mut shown.delivery.mail_api_key);
    hide(&mut shown.payment.secret_key);
    if let Some((scheme, rest)) = shown.database_url.split_once("://") {
        if let Some((_, host)) = rest.rsplit_once('@') {
            shown.database_url = format!("{scheme}://********@{host}");
        }
    }
    shown
}
