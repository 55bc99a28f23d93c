//! Application configuration.

use std::path::Path;

use perpdeck_api::ApiConfig;
use perpdeck_atoms::WidgetConfig;
use perpdeck_core::Address;
use perpdeck_wallet::KeySource;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Local wallet settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Where the private key is read from.
    pub key: KeySource,
    /// Refuse to start if the key derives a different address.
    #[serde(default)]
    pub expected_address: Option<Address>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_chain_id() -> u64 {
    42161
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    /// Without a wallet the runner stays read-only and disconnected.
    #[serde(default)]
    pub wallet: Option<WalletConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml(
            r#"
            [api]
            base_url = "https://api.example.com/v1"
            max_attempts = 5

            [widget]
            default_provider = "hyperliquid"

            [wallet]
            chain_id = 1
            key = { type = "env_var", var_name = "PERPDECK_PRIVATE_KEY" }
            "#,
        )
        .unwrap();

        assert_eq!(config.api.max_attempts, 5);
        assert_eq!(config.api.timeout_ms, 10_000);
        assert!(config.widget.default_provider.is_some());
        let wallet = config.wallet.unwrap();
        assert_eq!(wallet.chain_id, 1);
        assert_eq!(
            wallet.key,
            KeySource::EnvVar {
                var_name: "PERPDECK_PRIVATE_KEY".to_string()
            }
        );
    }

    #[test]
    fn test_minimal_config_is_read_only() {
        let config = AppConfig::from_toml("[api]\nbase_url = \"http://localhost:8080\"\n").unwrap();
        assert!(config.wallet.is_none());
        assert_eq!(config.widget, WidgetConfig::default());
    }

    #[test]
    fn test_missing_api_section_rejected() {
        assert!(matches!(AppConfig::from_toml(""), Err(AppError::Config(_))));
    }
}
