//! Logging bootstrap
//!
//! One `Registry` with an `EnvFilter` and a single `fmt` layer. The format
//! and level come from `[observability]`; a non-empty `RUST_LOG` replaces the
//! configured level.

use pushgate_config::ObservabilityConfig;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Errors raised while installing the subscriber
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// `log_format` is not pretty, compact or json
    #[error("Unknown log format: {0}. Expected one of: pretty, compact, json")]
    UnknownFormat(String),

    /// The filter directives do not parse
    #[error("Failed to parse log filter '{directives}': {reason}")]
    InvalidFilter {
        /// Directives that were tried
        directives: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, coloured
    #[default]
    Pretty,
    /// Single line
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(TelemetryError::UnknownFormat(s.to_string())),
        }
    }
}

/// `RUST_LOG` when set and non-empty, else the configured level
pub fn filter_directives(configured: &str, rust_log: Option<String>) -> String {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn build_env_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter {
        directives: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TelemetryError> {
    let format: LogFormat = config.log_format.parse()?;
    let directives = filter_directives(
        &config.log_level,
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let registry = Registry::default().with(build_env_filter(&directives)?);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .pretty(),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().with_target(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };

    installed.map_err(|e| TelemetryError::Install(e.to_string()))
}
