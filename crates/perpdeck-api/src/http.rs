//! REST implementation of [`ApiClient`].
//!
//! Every request is retried on transient failures (connection errors,
//! timeouts, 5xx and 429) up to `max_attempts` with linear backoff. Other
//! failures are returned immediately.

use std::time::Instant;

use perpdeck_core::{
    AccountBalances, AccountKey, Action, ActionId, ActionRequest, BoxFuture, Order, Position,
    Provider, RawPosition, SignedTransaction,
};
use perpdeck_telemetry::Metrics;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{endpoint, ApiClient};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
struct SubmitTransactionsBody<'a> {
    transactions: &'a [SignedTransaction],
}

/// Client for the trading REST API.
pub struct HttpApiClient {
    client: Client,
    config: ApiConfig,
}

impl HttpApiClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        info!(base_url = %config.base_url, max_attempts = config.max_attempts, "API client created");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn account_get(&self, account: &AccountKey, resource: &str) -> RequestBuilder {
        self.client
            .get(self.url(&format!("providers/{}/{resource}", account.provider)))
            .query(&[("address", account.address.as_str())])
    }

    /// Send with retry and return the JSON body.
    async fn send(
        &self,
        name: &'static str,
        request: RequestBuilder,
        retry: Retry,
    ) -> ApiResult<Value> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let attempt_request = request
                .try_clone()
                .ok_or_else(|| ApiError::HttpClient("Request body cannot be retried".to_string()))?;

            let started = Instant::now();
            let result = send_once(attempt_request).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(body) => {
                    Metrics::api_request(name, "ok", latency_ms);
                    debug!(endpoint = name, attempt, latency_ms, "API request succeeded");
                    return Ok(body);
                }
                Err(e) if retry.allows(&e) && attempt < max_attempts => {
                    Metrics::api_request(name, e.outcome(), latency_ms);
                    Metrics::api_retry(name);
                    let delay = self.config.backoff(attempt);
                    warn!(
                        endpoint = name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    Metrics::api_request(name, e.outcome(), latency_ms);
                    warn!(endpoint = name, attempt, error = %e, "API request failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Reads: any transient failure.
    Idempotent,
    /// Writes: only failures the server cannot have processed, so a
    /// timed-out action is never created twice.
    Unprocessed,
}

impl Retry {
    fn allows(self, err: &ApiError) -> bool {
        match self {
            Self::Idempotent => err.is_transient(),
            Self::Unprocessed => err.is_unprocessed(),
        }
    }
}

async fn send_once(request: RequestBuilder) -> ApiResult<Value> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status.as_u16(), body));
    }

    Ok(response.json::<Value>().await?)
}

/// Decode a list body (bare array or `{"data": [...]}`), skipping malformed items.
pub(crate) fn decode_list<T: DeserializeOwned>(name: &str, body: Value) -> ApiResult<Vec<T>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(ApiError::Decode(format!("{name}: expected a list"))),
        },
        _ => return Err(ApiError::Decode(format!("{name}: expected a list"))),
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(endpoint = name, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        debug!(endpoint = name, total, kept = decoded.len(), "Partial list decoded");
    }
    Ok(decoded)
}

impl ApiClient for HttpApiClient {
    fn get_providers(&self) -> BoxFuture<'_, ApiResult<Vec<Provider>>> {
        Box::pin(async move {
            let body = self
                .send(
                    endpoint::PROVIDERS,
                    self.client.get(self.url("providers")),
                    Retry::Idempotent,
                )
                .await?;
            decode_list(endpoint::PROVIDERS, body)
        })
    }

    fn get_positions(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Position>>> {
        Box::pin(async move {
            let body = self
                .send(
                    endpoint::POSITIONS,
                    self.account_get(&account, "positions"),
                    Retry::Idempotent,
                )
                .await?;
            let raw: Vec<RawPosition> = decode_list(endpoint::POSITIONS, body)?;
            Ok(raw.into_iter().map(Position::from).collect())
        })
    }

    fn get_orders(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<Vec<Order>>> {
        Box::pin(async move {
            let body = self
                .send(
                    endpoint::ORDERS,
                    self.account_get(&account, "orders"),
                    Retry::Idempotent,
                )
                .await?;
            decode_list(endpoint::ORDERS, body)
        })
    }

    fn get_balances(&self, account: AccountKey) -> BoxFuture<'_, ApiResult<AccountBalances>> {
        Box::pin(async move {
            let body = self
                .send(
                    endpoint::BALANCES,
                    self.account_get(&account, "balances"),
                    Retry::Idempotent,
                )
                .await?;
            Ok(serde_json::from_value(body)?)
        })
    }

    fn execute_action(&self, request: ActionRequest) -> BoxFuture<'_, ApiResult<Action>> {
        Box::pin(async move {
            info!(kind = %request.kind, provider = %request.provider, "Executing action");
            let body = self
                .send(
                    endpoint::EXECUTE_ACTION,
                    self.client.post(self.url("actions")).json(&request),
                    Retry::Unprocessed,
                )
                .await?;
            Ok(serde_json::from_value(body)?)
        })
    }

    fn submit_transactions(
        &self,
        action: ActionId,
        signed: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, ApiResult<Action>> {
        Box::pin(async move {
            info!(action = %action, count = signed.len(), "Submitting signed transactions");
            let body = SubmitTransactionsBody {
                transactions: &signed,
            };
            let response = self
                .send(
                    endpoint::SUBMIT_TRANSACTIONS,
                    self.client
                        .post(self.url(&format!("actions/{action}/transactions")))
                        .json(&body),
                    Retry::Unprocessed,
                )
                .await?;
            Ok(serde_json::from_value(response)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpdeck_core::{Address, ProviderId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + content_length {
                return;
            }
        }
    }

    /// Serve canned responses in order; the last one repeats.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut stream).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = &responses[n.min(responses.len() - 1)];
                let reply = format!(
                    "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn client(base_url: String) -> HttpApiClient {
        let mut config = ApiConfig::new(base_url);
        config.retry_backoff_ms = 1;
        HttpApiClient::new(config).unwrap()
    }

    fn account() -> AccountKey {
        AccountKey::new(
            Address::parse("0x00000000000000000000000000000000000000aa").unwrap(),
            ProviderId::new("hl").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let providers = json!([{"id": "hl", "name": "Hyperliquid", "network": "hyperliquid"}]);
        let (url, hits) = serve(vec![
            (503, "{}".to_string()),
            (503, "{}".to_string()),
            (200, providers.to_string()),
        ])
        .await;

        let providers = client(url).get_providers().await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_after_max_attempts() {
        let (url, hits) = serve(vec![(503, "{}".to_string())]).await;

        let err = client(url).get_providers().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let (url, hits) = serve(vec![(400, r#"{"error":"size too small"}"#.to_string())]).await;

        let err = client(url).execute_action(open_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref body) if body.contains("size too small")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    fn open_request() -> ActionRequest {
        ActionRequest {
            provider: ProviderId::new("hl").unwrap(),
            address: account().address,
            kind: perpdeck_core::ActionKind::Open,
            args: json!({}),
        }
    }

    #[tokio::test]
    async fn test_action_not_resent_after_server_error() {
        let (url, hits) = serve(vec![(503, "{}".to_string()), (200, "{}".to_string())]).await;

        let err = client(url).execute_action(open_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_action_resent_after_rate_limit() {
        let action = json!({
            "id": "action-1",
            "provider": "hl",
            "address": "0x00000000000000000000000000000000000000aa",
            "kind": "open",
            "status": "success",
            "transactions": [],
            "createdAt": "2026-01-05T12:00:00Z"
        });
        let (url, hits) = serve(vec![(429, "{}".to_string()), (200, action.to_string())]).await;

        let action = client(url).execute_action(open_request()).await.unwrap();
        assert_eq!(action.id.as_str(), "action-1");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_positions_skip_malformed_records() {
        let body = json!({"data": [
            {
                "id": "pos-1", "provider": "hl", "market": "BTC", "side": "long",
                "size": "0.5", "entryPrice": "60000", "markPrice": "61000", "leverage": 5
            },
            {"id": "pos-2", "side": "sideways"}
        ]});
        let (url, _) = serve(vec![(200, body.to_string())]).await;

        let positions = client(url).get_positions(account()).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].id.as_str(), "pos-1");
    }

    #[test]
    fn test_decode_list_rejects_non_list() {
        let result: ApiResult<Vec<Provider>> = decode_list("providers", json!({"error": "nope"}));
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_url_joins_segments() {
        let client = HttpApiClient::new(ApiConfig::new("http://localhost:8080/v1/")).unwrap();
        assert_eq!(client.url("/providers"), "http://localhost:8080/v1/providers");
    }
}
