//! Error types for perpdeck-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid leverage: {0}")]
    InvalidLeverage(u32),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
