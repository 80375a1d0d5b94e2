//! `tracing` subscriber installation.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::SampleError;

/// Transport crates that are chatty at debug level.
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("rustls", "warn"),
    ("h2", "warn"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `resource_token_sample=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Build the filter: `RUST_LOG` when set, otherwise `level` plus quiet
/// defaults for the transport crates.
///
/// # Errors
///
/// Returns [`SampleError::Logging`] if a directive does not parse.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, SampleError> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::try_from_default_env()
            .map_err(|e| SampleError::Logging(format!("invalid RUST_LOG: {e}")));
    }

    let directives = std::iter::once(level.to_owned())
        .chain(
            NOISY_TARGETS
                .iter()
                .map(|(target, lvl)| format!("{target}={lvl}")),
        )
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(&directives)
        .map_err(|e| SampleError::Logging(format!("invalid filter '{directives}': {e}")))
}

/// Install the global subscriber. Events go to stderr so stdout carries only
/// the run report.
///
/// # Errors
///
/// Returns [`SampleError::Logging`] on a bad filter or if a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SampleError> {
    let filter = build_env_filter(&config.level)?;

    let layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| SampleError::Logging(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
    Ok(())
}
