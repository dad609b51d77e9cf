//! Tracing setup
//!
//! JSON lines on stdout, filtered by `RUST_LOG` when set and by the configured
//! log level otherwise.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter for `log_level`, letting `RUST_LOG` take precedence
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let console_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry().with(console_layer).try_init()?;

    Ok(())
}
