//! Actions: side-effecting requests and the transactions they produce.
//!
//! An [`ActionRequest`] carries an opaque JSON payload built from one of the
//! typed argument bundles (`PlaceOrderArgs`, `CancelOrderArgs`, ...). The API
//! answers with an [`Action`] whose transactions must be signed by the
//! connected wallet.

use crate::error::{CoreError, Result};
use crate::ids::{ActionId, Address, MarketId, OrderId, PositionId, ProviderId};
use crate::position::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of action submitted to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Open,
    Close,
    UpdateLeverage,
    UpdateTpSl,
    CancelOrder,
    Deposit,
    Withdraw,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::UpdateLeverage => "updateLeverage",
            Self::UpdateTpSl => "updateTpSl",
            Self::CancelOrder => "cancelOrder",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed argument bundle for one action kind.
pub trait ActionArgs: Serialize {
    /// The action kind these arguments belong to.
    const KIND: ActionKind;

    /// Check argument invariants before anything is sent.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn ensure_positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

/// Open a new position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderArgs {
    pub market: MarketId,
    pub side: Side,
    /// Margin amount in collateral units.
    pub amount: Decimal,
    pub leverage: u32,
    /// Limit price; market order when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
}

impl ActionArgs for PlaceOrderArgs {
    const KIND: ActionKind = ActionKind::Open;

    fn validate(&self) -> Result<()> {
        ensure_positive("amount", self.amount)?;
        if self.leverage == 0 {
            return Err(CoreError::InvalidLeverage(self.leverage));
        }
        if let Some(px) = self.limit_price {
            ensure_positive("limit price", px)?;
        }
        Ok(())
    }
}

/// Close (part of) a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionArgs {
    pub position_id: PositionId,
    /// Size to close; full close when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
}

impl ActionArgs for ClosePositionArgs {
    const KIND: ActionKind = ActionKind::Close;

    fn validate(&self) -> Result<()> {
        if let Some(size) = self.size {
            ensure_positive("size", size)?;
        }
        Ok(())
    }
}

/// Change leverage of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLeverageArgs {
    pub market: MarketId,
    pub leverage: u32,
}

impl ActionArgs for EditLeverageArgs {
    const KIND: ActionKind = ActionKind::UpdateLeverage;

    fn validate(&self) -> Result<()> {
        if self.leverage == 0 {
            return Err(CoreError::InvalidLeverage(self.leverage));
        }
        Ok(())
    }
}

/// Attach take-profit and/or stop-loss triggers to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTpSlArgs {
    pub position_id: PositionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
}

impl ActionArgs for SetTpSlArgs {
    const KIND: ActionKind = ActionKind::UpdateTpSl;

    fn validate(&self) -> Result<()> {
        if self.take_profit.is_none() && self.stop_loss.is_none() {
            return Err(CoreError::InvalidAmount(
                "take profit or stop loss required".to_string(),
            ));
        }
        if let Some(tp) = self.take_profit {
            ensure_positive("take profit", tp)?;
        }
        if let Some(sl) = self.stop_loss {
            ensure_positive("stop loss", sl)?;
        }
        Ok(())
    }
}

/// Cancel a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderArgs {
    pub order_id: OrderId,
}

impl ActionArgs for CancelOrderArgs {
    const KIND: ActionKind = ActionKind::CancelOrder;
}

/// Move collateral in or out of the provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferArgs {
    pub asset: String,
    pub amount: Decimal,
}

impl TransferArgs {
    fn check(&self) -> Result<()> {
        if self.asset.trim().is_empty() {
            return Err(CoreError::InvalidId("asset".to_string()));
        }
        ensure_positive("amount", self.amount)
    }
}

/// Deposit wrapper so deposit and withdraw keep distinct kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositArgs(pub TransferArgs);

impl ActionArgs for DepositArgs {
    const KIND: ActionKind = ActionKind::Deposit;

    fn validate(&self) -> Result<()> {
        self.0.check()
    }
}

/// Withdraw wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawArgs(pub TransferArgs);

impl ActionArgs for WithdrawArgs {
    const KIND: ActionKind = ActionKind::Withdraw;

    fn validate(&self) -> Result<()> {
        self.0.check()
    }
}

/// Request submitted to the action-execution endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub provider: ProviderId,
    pub address: Address,
    pub kind: ActionKind,
    /// Opaque argument payload.
    pub args: serde_json::Value,
}

impl ActionRequest {
    /// Build a request from a typed argument bundle, validating it first.
    pub fn new<A: ActionArgs>(provider: ProviderId, address: Address, args: &A) -> Result<Self> {
        args.validate()?;
        Ok(Self {
            provider,
            address,
            kind: A::KIND,
            args: serde_json::to_value(args)?,
        })
    }
}

/// Lifecycle of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionStatus {
    Created,
    WaitingForSignature,
    Submitted,
    Success,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Transaction produced by an action, waiting for a wallet signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub id: String,
    pub network: String,
    /// Hex-encoded bytes to sign (`0x`-prefixed).
    pub payload: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Transaction signed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub transaction_id: String,
    pub payload: String,
    /// 65-byte signature, `0x`-prefixed hex (r || s || v).
    pub signature: String,
}

/// An action created by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,
    pub provider: ProviderId,
    pub address: Address,
    pub status: ActionStatus,
    #[serde(default)]
    pub transactions: Vec<UnsignedTransaction>,
    pub created_at: DateTime<Utc>,
}

impl Action {
    /// Whether the wallet still has to sign something.
    pub fn needs_signature(&self) -> bool {
        !self.status.is_terminal() && !self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn addr() -> Address {
        Address::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    #[test]
    fn test_request_carries_kind_and_payload() {
        let args = CancelOrderArgs {
            order_id: OrderId::new("o-1").unwrap(),
        };
        let req = ActionRequest::new(ProviderId::new("hl").unwrap(), addr(), &args).unwrap();
        assert_eq!(req.kind, ActionKind::CancelOrder);
        assert_eq!(req.args["orderId"], "o-1");
    }

    #[test]
    fn test_invalid_args_rejected_before_request() {
        let args = PlaceOrderArgs {
            market: MarketId::new("BTC").unwrap(),
            side: Side::Long,
            amount: dec!(0),
            leverage: 5,
            limit_price: None,
        };
        assert!(ActionRequest::new(ProviderId::new("hl").unwrap(), addr(), &args).is_err());

        let tpsl = SetTpSlArgs {
            position_id: PositionId::new("p").unwrap(),
            take_profit: None,
            stop_loss: None,
        };
        assert!(tpsl.validate().is_err());
    }

    #[test]
    fn test_transfer_kinds_distinct() {
        let transfer = TransferArgs {
            asset: "USDC".to_string(),
            amount: dec!(25),
        };
        let deposit = ActionRequest::new(
            ProviderId::new("hl").unwrap(),
            addr(),
            &DepositArgs(transfer.clone()),
        )
        .unwrap();
        let withdraw =
            ActionRequest::new(ProviderId::new("hl").unwrap(), addr(), &WithdrawArgs(transfer))
                .unwrap();

        assert_eq!(deposit.kind, ActionKind::Deposit);
        assert_eq!(withdraw.kind, ActionKind::Withdraw);
        assert_eq!(deposit.args, withdraw.args);
    }

    #[test]
    fn test_needs_signature() {
        let mut action = Action {
            id: ActionId::new("a-1").unwrap(),
            kind: ActionKind::Open,
            provider: ProviderId::new("hl").unwrap(),
            address: addr(),
            status: ActionStatus::Created,
            transactions: vec![UnsignedTransaction {
                id: "tx-1".to_string(),
                network: "arbitrum".to_string(),
                payload: "0xdeadbeef".to_string(),
                description: None,
            }],
            created_at: Utc::now(),
        };
        assert!(action.needs_signature());

        action.status = ActionStatus::Success;
        assert!(!action.needs_signature());
    }
}
