//! Prometheus metrics and structured logging for perpdeck.
//!
//! - Prometheus metrics for graph recomputation, wallet transitions,
//!   API traffic and submitted actions
//! - Structured logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use metrics::Metrics;
