//! Structured logging setup

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Structured logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
    /// Include the module target in each line
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level> {
        self.level
            .parse()
            .with_context(|| format!("Invalid log level: {}", self.level))
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let level = config.level()?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_not_set| EnvFilter::new(level.to_string()));

    let fmt_layer = if config.json_format {
        fmt::layer()
            .json()
            .with_target(config.include_target)
            .boxed()
    } else {
        fmt::layer()
            .with_target(config.include_target)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(
        "Structured logging initialized - level: {}, json: {}",
        level, config.json_format
    );
    Ok(())
}
