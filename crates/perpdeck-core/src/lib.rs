//! Core domain types for perpdeck.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `Address`, `ProviderId`, `MarketId`: validated identifiers
//! - `Position`, `Order`, `AccountBalances`: portfolio records
//! - `ActionRequest`, `Action`: side-effecting requests and their results
//! - `UnsignedTransaction`, `SignedTransaction`: wallet signing payloads

pub mod action;
pub mod balance;
pub mod error;
pub mod ids;
pub mod order;
pub mod position;
pub mod provider;

pub use action::{
    Action, ActionArgs, ActionKind, ActionRequest, ActionStatus, CancelOrderArgs,
    ClosePositionArgs, DepositArgs, EditLeverageArgs, PlaceOrderArgs, SetTpSlArgs,
    SignedTransaction, TransferArgs, UnsignedTransaction, WithdrawArgs,
};
pub use balance::{AccountBalances, Balance};
pub use error::{CoreError, Result};
pub use ids::{AccountKey, ActionId, Address, MarketId, OrderId, PositionId, ProviderId};
pub use order::{Order, OrderType};
pub use position::{decode_pending_actions, PendingAction, Position, RawPosition, Side};
pub use provider::Provider;

/// Boxed future returned by capability traits.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
