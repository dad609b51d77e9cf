//! Flight check-in service
//!
//! HTTP API over the flight table plus the check-in workflow.

use anyhow::Result;
use clap::Parser;
use flight_checkin::{
    config::{Environment, Settings, StoreBackend},
    logging::init_tracing,
    server::App,
};

/// Flight check-in service
#[derive(Parser, Debug)]
#[command(name = "flight-checkin")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Storage backend: dynamodb, memory (overrides STORE_BACKEND env var)
    #[arg(long)]
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if let Some(store) = args.store {
        settings.store_backend = store;
    }

    init_tracing(&settings.log_level)?;

    settings.validate()?;

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        store = %settings.store_backend,
        table = %settings.table_name,
        host = %settings.host,
        port = %settings.port,
        "Starting application"
    );

    let app = App::new(settings).await?;

    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}
