//! Perpetuals provider descriptions.

use crate::ids::{MarketId, ProviderId};
use serde::{Deserialize, Serialize};

/// A perpetual-futures venue the widget can route orders to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: ProviderId,
    /// Display name.
    pub name: String,
    /// Settlement network (e.g. "arbitrum").
    pub network: String,
    /// Maximum leverage across the provider's markets.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
    /// Tradable markets.
    #[serde(default)]
    pub markets: Vec<MarketId>,
    /// Whether the provider currently accepts new orders.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_leverage() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl Provider {
    /// Check whether a market is listed on this provider.
    pub fn lists(&self, market: &MarketId) -> bool {
        self.markets.contains(market)
    }

    /// Check whether a leverage value is allowed.
    pub fn allows_leverage(&self, leverage: u32) -> bool {
        leverage >= 1 && leverage <= self.max_leverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let raw = r#"{"id": "hl", "name": "Hyperliquid", "network": "hyperevm"}"#;
        let provider: Provider = serde_json::from_str(raw).unwrap();
        assert!(provider.enabled);
        assert_eq!(provider.max_leverage, 1);
        assert!(provider.markets.is_empty());
    }

    #[test]
    fn test_allows_leverage() {
        let raw = r#"{"id": "hl", "name": "Hyperliquid", "network": "hyperevm", "maxLeverage": 50, "markets": ["BTC"]}"#;
        let provider: Provider = serde_json::from_str(raw).unwrap();
        assert!(provider.allows_leverage(50));
        assert!(!provider.allows_leverage(0));
        assert!(!provider.allows_leverage(51));
        assert!(provider.lists(&MarketId::new("BTC").unwrap()));
    }
}
