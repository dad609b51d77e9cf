//! Application server
//!
//! This module provides the main application server implementation
//! including initialization and graceful shutdown handling.

use crate::{
    config::Settings,
    server::{routes, state::AppState},
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::signal;

/// Main application struct
pub struct App {
    settings: Settings,
    state: AppState,
}

impl App {
    /// Create a new application instance
    pub async fn new(settings: Settings) -> Result<Self> {
        tracing::debug!("Initializing application state");
        let state = AppState::new(settings.clone()).await?;

        Ok(Self { settings, state })
    }

    /// Run the server with graceful shutdown support
    ///
    /// The server will shut down gracefully when receiving SIGINT (Ctrl+C)
    /// or SIGTERM signals.
    pub async fn run_with_graceful_shutdown(self) -> Result<()> {
        let addr = self
            .settings
            .server_addr()
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server address {}", self.settings.server_addr()))?;
        let router = routes::create_router(self.state.clone());

        tracing::info!("Starting server on {} with graceful shutdown enabled", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!(uptime_seconds = self.state.uptime_seconds(), "Server stopped");

        Ok(())
    }

    /// Get a reference to the application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Create a future that completes when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
