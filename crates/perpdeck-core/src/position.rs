//! Open positions and their pending actions.
//!
//! The API returns pending actions as loosely typed JSON. They are decoded
//! into [`PendingAction`] one by one; entries that do not match a known shape
//! are dropped so a single malformed record never breaks the whole position.

use crate::ids::{MarketId, OrderId, PositionId, ProviderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// An action the provider expects the user to complete on a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingAction {
    /// Close (part of) the position.
    #[serde(rename_all = "camelCase")]
    Close {
        #[serde(default)]
        size: Option<Decimal>,
    },
    /// Change the position leverage.
    #[serde(rename_all = "camelCase")]
    UpdateLeverage { leverage: u32 },
    /// Attach or change take-profit / stop-loss triggers.
    #[serde(rename_all = "camelCase")]
    UpdateTpSl {
        #[serde(default)]
        take_profit: Option<Decimal>,
        #[serde(default)]
        stop_loss: Option<Decimal>,
    },
    /// Cancel a resting order linked to the position.
    #[serde(rename_all = "camelCase")]
    CancelOrder { order_id: OrderId },
}

/// Decode raw pending-action payloads, dropping entries of unknown shape.
pub fn decode_pending_actions(raw: &[serde_json::Value]) -> Vec<PendingAction> {
    raw.iter()
        .filter_map(|value| match serde_json::from_value::<PendingAction>(value.clone()) {
            Ok(action) => Some(action),
            Err(e) => {
                debug!(error = %e, payload = %value, "Dropping malformed pending action");
                None
            }
        })
        .collect()
}

/// Position as returned by the API, before pending actions are decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub id: PositionId,
    pub provider: ProviderId,
    pub market: MarketId,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: u32,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub pending_actions: Vec<serde_json::Value>,
}

/// An open position with decoded pending actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: PositionId,
    pub provider: ProviderId,
    pub market: MarketId,
    pub side: Side,
    /// Position size in base units (always positive).
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: u32,
    pub liquidation_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub pending_actions: Vec<PendingAction>,
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        let pending_actions = decode_pending_actions(&raw.pending_actions);
        Self {
            id: raw.id,
            provider: raw.provider,
            market: raw.market,
            side: raw.side,
            size: raw.size,
            entry_price: raw.entry_price,
            mark_price: raw.mark_price,
            leverage: raw.leverage,
            liquidation_price: raw.liquidation_price,
            take_profit: raw.take_profit,
            stop_loss: raw.stop_loss,
            pending_actions,
        }
    }
}

impl Position {
    /// Notional value at the mark price.
    pub fn notional(&self) -> Decimal {
        self.size * self.mark_price
    }

    /// Unrealized PnL at the mark price.
    pub fn unrealized_pnl(&self) -> Decimal {
        let diff = self.mark_price - self.entry_price;
        match self.side {
            Side::Long => diff * self.size,
            Side::Short => -diff * self.size,
        }
    }

    /// Margin committed to the position.
    pub fn margin(&self) -> Decimal {
        if self.leverage == 0 {
            return self.notional();
        }
        self.notional() / Decimal::from(self.leverage)
    }
}
