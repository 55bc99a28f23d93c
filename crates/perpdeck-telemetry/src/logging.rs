//! Structured logging initialization.
//!
//! Graph, wallet and API events carry structured fields (`node`, `status`,
//! `endpoint`). The JSON format also records the current span and span list.

use std::str::FromStr;

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,perpdeck=debug";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(TelemetryError::LoggingInit(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

impl LogFormat {
    /// `PERPDECK_LOG_FORMAT` wins; otherwise JSON when `RUST_ENV=production`.
    pub fn from_env() -> TelemetryResult<Self> {
        Self::resolve(
            std::env::var("PERPDECK_LOG_FORMAT").ok().as_deref(),
            std::env::var("RUST_ENV").ok().as_deref(),
        )
    }

    fn resolve(explicit: Option<&str>, rust_env: Option<&str>) -> TelemetryResult<Self> {
        match explicit {
            Some(format) => format.parse(),
            None if rust_env == Some("production") => Ok(Self::Json),
            None => Ok(Self::Pretty),
        }
    }
}

/// Install the global subscriber with the format from the environment.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env()?)
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
