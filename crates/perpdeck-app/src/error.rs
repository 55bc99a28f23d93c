//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(#[from] perpdeck_api::ApiError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] perpdeck_wallet::WalletError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] perpdeck_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
