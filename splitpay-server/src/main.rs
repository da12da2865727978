//! Split-payment reconciliation server.
//!
//! Tracks per-participant shares of a venue booking, reconciles gateway
//! payment reports into them, and confirms the booking once every share is
//! paid.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use anyhow::Context;
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use splitpay_core::booking::BookingAggregate;
use splitpay_core::config::LogFormat;
use splitpay_core::events::domain_event_channel;
use splitpay_core::ledger::SplitLedger;
use splitpay_core::notifications::NotificationService;
use splitpay_core::processors::{ExpirySweeper, NotificationDispatcher};
use splitpay_core::store::PgSplitStore;
use sqlx::postgres::PgPoolOptions;
use state::{AppState, Engine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Split-payment reconciliation service for venue bookings
#[derive(Parser, Debug)]
#[command(name = "splitpay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./splitpay-config.toml", env = "SPLITPAY_CONFIG")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The log format lives in the config file, so tracing starts after it loads.
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader
        .load()
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;

    init_tracing(loaded_config.server.log_format);

    tracing::info!("Starting splitpay-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded from {:?}", args.config);
    if loaded_config.admin_secret_rehashed {
        tracing::info!("Admin secret hashed and config file updated");
    }

    let listen_addr = loaded_config.server.listen;
    let request_ttl = time::Duration::try_from(loaded_config.expiry.request_ttl)
        .context("request_ttl_secs is out of range")?;
    let notifier: Arc<dyn NotificationService> =
        Arc::new(loaded_config.notifications.build_service());
    let directory = loaded_config.directory.build();
    let gateway = Arc::new(loaded_config.gateway.http_gateway());

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(PgSplitStore::new(db_pool.clone()));
    let (event_tx, event_rx) = domain_event_channel();
    let engine: Engine = Engine::new(
        SplitLedger::new(Arc::clone(&store), request_ttl),
        BookingAggregate::new(Arc::clone(&store)),
        gateway,
        event_tx,
    );

    // Background processors
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = NotificationDispatcher::new(Arc::clone(&store), notifier, directory);
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx.clone(), event_rx));
    let sweeper = ExpirySweeper::new(engine.ledger().clone());
    let sweeper_handle = tokio::spawn(sweeper.run(
        shutdown_rx,
        shared_config.expiry.clone(),
        shared_config.expiry.subscribe(),
    ));

    let state = AppState::new(shared_config, engine);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    shutdown_notify.notify_one();
    let _ = shutdown_tx.send(true);
    let processors = [
        ("NotificationDispatcher", dispatcher_handle),
        ("ExpirySweeper", sweeper_handle),
    ];
    for (name, handle) in processors {
        if let Err(e) = handle.await {
            tracing::error!(processor = name, error = %e, "Processor task failed");
        }
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}
