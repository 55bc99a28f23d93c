//! In-memory [`ApiClient`] for tests and offline runs.
//!
//! Serves canned responses, records every call, and can be told to fail
//! a given endpoint until cleared.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use perpdeck_core::{
    AccountBalances, AccountKey, Action, ActionId, ActionRequest, ActionStatus, BoxFuture, Order,
    Position, Provider, SignedTransaction, UnsignedTransaction,
};
use tracing::debug;

use crate::client::{endpoint, ApiClient};
use crate::error::{ApiError, ApiResult};

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetProviders,
    GetPositions(AccountKey),
    GetOrders(AccountKey),
    GetBalances(AccountKey),
    ExecuteAction(ActionRequest),
    SubmitTransactions {
        action: ActionId,
        signed: Vec<SignedTransaction>,
    },
}

impl MockCall {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::GetProviders => endpoint::PROVIDERS,
            Self::GetPositions(_) => endpoint::POSITIONS,
            Self::GetOrders(_) => endpoint::ORDERS,
            Self::GetBalances(_) => endpoint::BALANCES,
            Self::ExecuteAction(_) => endpoint::EXECUTE_ACTION,
            Self::SubmitTransactions { .. } => endpoint::SUBMIT_TRANSACTIONS,
        }
    }
}

/// Mock API client.
pub struct MockApiClient {
    providers: Mutex<Vec<Provider>>,
    positions: Mutex<HashMap<AccountKey, Vec<Position>>>,
    orders: Mutex<HashMap<AccountKey, Vec<Order>>>,
    balances: Mutex<HashMap<AccountKey, AccountBalances>>,
    /// Transactions attached to every created action.
    action_transactions: Mutex<Vec<UnsignedTransaction>>,
    actions: Mutex<HashMap<ActionId, Action>>,
    failures: Mutex<HashMap<&'static str, ApiError>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<MockCall>>,
    next_action: Mutex<u64>,
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApiClient {
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(Vec::new()),
            positions: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            action_transactions: Mutex::new(Vec::new()),
            actions: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            next_action: Mutex::new(0),
        }
    }

    pub fn set_providers(&self, providers: Vec<Provider>) {
        *self.providers.lock() = providers;
    }

    pub fn set_positions(&self, account: AccountKey, positions: Vec<Position>) {
        self.positions.lock().insert(account, positions);
    }

    pub fn set_orders(&self, account: AccountKey, orders: Vec<Order>) {
        self.orders.lock().insert(account, orders);
    }

    pub fn set_balances(&self, account: AccountKey, balances: AccountBalances) {
        self.balances.lock().insert(account, balances);
    }

    /// Transactions to attach to actions created from now on.
    pub fn set_action_transactions(&self, transactions: Vec<UnsignedTransaction>) {
        *self.action_transactions.lock() = transactions;
    }

    /// Fail every call to `endpoint` with `error` until cleared.
    pub fn fail(&self, endpoint: &'static str, error: ApiError) {
        self.failures.lock().insert(endpoint, error);
    }

    pub fn clear_failure(&self, endpoint: &'static str) {
        self.failures.lock().remove(endpoint);
    }

    /// Delay every response.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made to an endpoint.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    pub fn executed_actions(&self) -> Vec<ActionRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::ExecuteAction(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Record the call, apply latency and injected failures.
    async fn enter(&self, call: MockCall) -> ApiResult<()> {
        let name = call.endpoint();
        debug!(endpoint = name, "Mock API call");
        self.calls.lock().push(call);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.failures.lock().get(name) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn create_action(&self, request: &ActionRequest) -> ApiResult<Action> {
        let id = {
            let mut next = self.next_action.lock();
            *next += 1;
            ActionId::new(format!("action-{}", *next)).map_err(|e| ApiError::Decode(e.to_string()))?
        };
        let transactions = self.action_transactions.lock().clone();
        let status = if transactions.is_empty() {
            ActionStatus::Success
        } else {
            ActionStatus::WaitingForSignature
        };

        let action = Action {
            id: id.clone(),
            kind: request.kind,
            provider: request.provider.clone(),
            address: request.address.clone(),
            status,
            transactions,
            created_at: Utc::now(),
        };
        self.actions.lock().insert(id, action.clone());
        Ok(action)
    }
}

impl ApiClient for MockApiClient {
    fn get_providers(&self) -> BoxFuture<'_, ApiResult<Vec<Provider>>> {
        Box::pin(async move {
            self.enter(MockCall::GetProviders).await?;
            Ok(self.providers.lock().clone())
        })
    }

    fn get_positions(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Position>>> {
        Box::pin(async move {
            self.enter(MockCall::GetPositions(account.clone())).await?;
            Ok(self.positions.lock().get(&account).cloned().unwrap_or_default())
        })
    }

    fn get_orders(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Order>>> {
        Box::pin(async move {
            self.enter(MockCall::GetOrders(account.clone())).await?;
            Ok(self.orders.lock().get(&account).cloned().unwrap_or_default())
        })
    }

    fn get_balances(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<AccountBalances>> {
        Box::pin(async move {
            self.enter(MockCall::GetBalances(account.clone())).await?;
            let balances = self.balances.lock().get(&account).cloned();
            Ok(balances.unwrap_or_else(|| AccountBalances {
                provider: account.provider,
                address: account.address,
                balances: Vec::new(),
            }))
        })
    }

    fn execute_action(&self, request: ActionRequest) -> BoxFuture<'_, ApiResult<Action>> {
        Box::pin(async move {
            self.enter(MockCall::ExecuteAction(request.clone())).await?;
            self.create_action(&request)
        })
    }

    fn submit_transactions(
        &self,
        action: ActionId,
        signed: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, ApiResult<Action>> {
        Box::pin(async move {
            self.enter(MockCall::SubmitTransactions {
                action: action.clone(),
                signed: signed.clone(),
            })
            .await?;

            let mut actions = self.actions.lock();
            let stored = actions
                .get_mut(&action)
                .ok_or_else(|| ApiError::NotFound(format!("action {action}")))?;

            let expected = stored.transactions.len();
            if signed.len() != expected {
                return Err(ApiError::Rejected(format!(
                    "expected {expected} signatures, got {}",
                    signed.len()
                )));
            }
            stored.status = ActionStatus::Submitted;
            Ok(stored.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpdeck_core::{ActionKind, Address, ProviderId};
    use serde_json::json;

    fn request() -> ActionRequest {
        ActionRequest {
            provider: ProviderId::new("hl").unwrap(),
            address: Address::parse("0x00000000000000000000000000000000000000aa").unwrap(),
            kind: ActionKind::Deposit,
            args: json!({"asset": "USDC", "amount": "100"}),
        }
    }

    fn unsigned(id: &str) -> UnsignedTransaction {
        UnsignedTransaction {
            id: id.to_string(),
            network: "arbitrum".to_string(),
            payload: "0x01".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_records_calls_and_creates_actions() {
        let mock = MockApiClient::new();
        mock.set_action_transactions(vec![unsigned("tx-1")]);

        let action = mock.execute_action(request()).await.unwrap();
        assert_eq!(action.kind, ActionKind::Deposit);
        assert_eq!(action.status, ActionStatus::WaitingForSignature);
        assert!(action.needs_signature());

        assert_eq!(mock.call_count(endpoint::EXECUTE_ACTION), 1);
        assert_eq!(mock.executed_actions(), vec![request()]);
    }

    #[tokio::test]
    async fn test_submit_checks_signature_count() {
        let mock = MockApiClient::new();
        mock.set_action_transactions(vec![unsigned("tx-1")]);
        let action = mock.execute_action(request()).await.unwrap();

        let err = mock.submit_transactions(action.id.clone(), vec![]).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));

        let signed = SignedTransaction {
            transaction_id: "tx-1".to_string(),
            payload: "0x01".to_string(),
            signature: "0xsig".to_string(),
        };
        let submitted = mock.submit_transactions(action.id, vec![signed]).await.unwrap();
        assert_eq!(submitted.status, ActionStatus::Submitted);

        let missing = ActionId::new("action-404").unwrap();
        assert!(matches!(
            mock.submit_transactions(missing, vec![]).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_until_cleared() {
        let mock = MockApiClient::new();
        mock.fail(endpoint::PROVIDERS, ApiError::from_status(503, "down".into()));

        assert!(mock.get_providers().await.is_err());
        mock.clear_failure(endpoint::PROVIDERS);
        assert!(mock.get_providers().await.unwrap().is_empty());
        assert_eq!(mock.call_count(endpoint::PROVIDERS), 2);
    }
}
