//! Reactivity tags shared by atoms and mutations.

use perpdeck_core::ActionKind;

pub const PROVIDERS: &str = "providers";
pub const POSITIONS: &str = "positions";
pub const ORDERS: &str = "orders";
pub const BALANCES: &str = "balances";

/// Tags whose data an action of `kind` changes.
pub fn affected_by(kind: ActionKind) -> &'static [&'static str] {
    match kind {
        ActionKind::Open | ActionKind::Close => &[POSITIONS, ORDERS, BALANCES],
        ActionKind::UpdateLeverage => &[POSITIONS, BALANCES],
        ActionKind::UpdateTpSl => &[POSITIONS, ORDERS],
        ActionKind::CancelOrder => &[ORDERS],
        ActionKind::Deposit | ActionKind::Withdraw => &[BALANCES],
    }
}
