//! Trading API capability.

use perpdeck_core::{
    AccountBalances, AccountKey, Action, ActionId, ActionRequest, BoxFuture, Order, Position,
    Provider, SignedTransaction,
};

use crate::error::ApiResult;

/// Endpoint labels used for logs and metrics.
pub mod endpoint {
    pub const PROVIDERS: &str = "providers";
    pub const POSITIONS: &str = "positions";
    pub const ORDERS: &str = "orders";
    pub const BALANCES: &str = "balances";
    pub const EXECUTE_ACTION: &str = "execute_action";
    pub const SUBMIT_TRANSACTIONS: &str = "submit_transactions";
}

/// Read and write access to the trading API.
pub trait ApiClient: Send + Sync {
    fn get_providers(&self) -> BoxFuture<'_, ApiResult<Vec<Provider>>>;

    fn get_positions(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Position>>>;

    fn get_orders(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Order>>>;

    fn get_balances(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<AccountBalances>>;

    /// Create an action. The returned action may carry transactions to sign.
    fn execute_action(&self, request: ActionRequest) -> BoxFuture<'_, ApiResult<Action>>;

    /// Submit signatures for an action's transactions.
    fn submit_transactions(
        &self,
        action: ActionId,
        signed: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, ApiResult<Action>>;
}
