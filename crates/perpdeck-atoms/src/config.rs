//! Widget configuration.

use std::time::Duration;

use perpdeck_core::ProviderId;
use serde::Deserialize;

/// Settings shared by every trading atom.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WidgetConfig {
    /// Provider selected at startup.
    #[serde(default)]
    pub default_provider: Option<ProviderId>,
    #[serde(default = "default_providers_refresh_ms")]
    pub providers_refresh_ms: u64,
    #[serde(default = "default_positions_refresh_ms")]
    pub positions_refresh_ms: u64,
    #[serde(default = "default_orders_refresh_ms")]
    pub orders_refresh_ms: u64,
    #[serde(default = "default_balances_refresh_ms")]
    pub balances_refresh_ms: u64,
}

fn default_providers_refresh_ms() -> u64 {
    300_000
}

fn default_positions_refresh_ms() -> u64 {
    10_000
}

fn default_orders_refresh_ms() -> u64 {
    10_000
}

fn default_balances_refresh_ms() -> u64 {
    30_000
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            providers_refresh_ms: default_providers_refresh_ms(),
            positions_refresh_ms: default_positions_refresh_ms(),
            orders_refresh_ms: default_orders_refresh_ms(),
            balances_refresh_ms: default_balances_refresh_ms(),
        }
    }
}

impl WidgetConfig {
    pub fn with_default_provider(mut self, provider: ProviderId) -> Self {
        self.default_provider = Some(provider);
        self
    }

    pub fn providers_refresh(&self) -> Duration {
        Duration::from_millis(self.providers_refresh_ms)
    }

    pub fn positions_refresh(&self) -> Duration {
        Duration::from_millis(self.positions_refresh_ms)
    }

    pub fn orders_refresh(&self) -> Duration {
        Duration::from_millis(self.orders_refresh_ms)
    }

    pub fn balances_refresh(&self) -> Duration {
        Duration::from_millis(self.balances_refresh_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WidgetConfig = toml::from_str(
            r#"
            default_provider = "hyperliquid"
            positions_refresh_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.default_provider.as_ref().map(|p| p.as_str()), Some("hyperliquid"));
        assert_eq!(config.positions_refresh(), Duration::from_secs(5));
        assert_eq!(config.balances_refresh_ms, default_balances_refresh_ms());
    }
}
