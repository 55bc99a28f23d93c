//! Headless perpdeck runner.
//!
//! Loads a TOML configuration, connects the HTTP API client and a local
//! wallet to the trading runtime, and logs state changes until stopped.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, WalletConfig};
pub use error::{AppError, AppResult};
