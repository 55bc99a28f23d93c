//! Error types for perpdeck-wallet.

use perpdeck_core::{Address, CoreError};
use thiserror::Error;

/// Wallet error types.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Wallet source already subscribed")]
    AlreadySubscribed,

    #[error("Wallet bridge closed")]
    Closed,

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction {id} has an invalid payload: {reason}")]
    InvalidPayload { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
