//! Resting orders.

use crate::ids::{MarketId, OrderId, ProviderId};
use crate::position::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderType {
    Market,
    Limit,
    TakeProfit,
    StopLoss,
}

impl OrderType {
    /// Trigger orders fire on a price condition rather than resting on the book.
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::TakeProfit | Self::StopLoss)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
            Self::TakeProfit => write!(f, "takeProfit"),
            Self::StopLoss => write!(f, "stopLoss"),
        }
    }
}

/// An open order on a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub provider: ProviderId,
    pub market: MarketId,
    pub side: Side,
    pub order_type: OrderType,
    pub size: Decimal,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    #[serde(default)]
    pub reduce_only: bool,
    pub created_at: DateTime<Utc>,
}
