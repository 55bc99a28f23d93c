//! Account balances.

use crate::ids::{Address, ProviderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of a single collateral asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Asset symbol (e.g. "USDC").
    pub asset: String,
    /// Amount free for new positions or withdrawal.
    pub available: Decimal,
    /// Total amount including margin in use.
    pub total: Decimal,
}

impl Balance {
    /// Amount locked as margin.
    pub fn locked(&self) -> Decimal {
        self.total - self.available
    }
}

/// All balances of one account on one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalances {
    pub provider: ProviderId,
    pub address: Address,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

impl AccountBalances {
    /// Available amount of an asset (zero if not held).
    pub fn available(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| b.available)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of all total balances.
    pub fn total_equity(&self) -> Decimal {
        self.balances.iter().map(|b| b.total).sum()
    }
}
