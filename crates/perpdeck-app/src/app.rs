//! Application wiring and main loop.

use std::sync::Arc;

use perpdeck_api::HttpApiClient;
use perpdeck_atoms::Runtime;
use perpdeck_core::ProviderId;
use perpdeck_graph::NodeResult;
use perpdeck_telemetry::Metrics;
use perpdeck_wallet::{
    ChannelWalletSource, LocalSigner, LocalWalletSource, TransactionSigner, WalletSource,
};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, WalletConfig};
use crate::error::AppResult;

/// Headless runner around a [`Runtime`].
pub struct Application {
    runtime: Runtime,
}

fn wallet_source(config: Option<&WalletConfig>) -> AppResult<Arc<dyn WalletSource>> {
    let Some(wallet) = config else {
        info!("No wallet configured, running read-only");
        let (source, handle) = ChannelWalletSource::new();
        handle.disconnect();
        return Ok(Arc::new(source));
    };

    let signer = LocalSigner::load(&wallet.key, wallet.expected_address.as_ref())?;
    info!(address = %signer.address().short(), chain_id = wallet.chain_id, "Local wallet loaded");
    let mut source = LocalWalletSource::new(signer, wallet.chain_id);
    if let Some(label) = &wallet.label {
        source = source.with_label(label.clone());
    }
    Ok(Arc::new(source))
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api = Arc::new(HttpApiClient::new(config.api.clone())?);
        let source = wallet_source(config.wallet.as_ref())?;
        let runtime = Runtime::new(api, source, config.widget);
        Ok(Self { runtime })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Override the provider selected by configuration.
    pub fn select_provider(&self, provider: ProviderId) {
        self.runtime.select_provider(Some(provider));
    }

    /// Observe the trading state until Ctrl-C, then shut down.
    pub async fn run(self) -> AppResult<()> {
        let graph = self.runtime.graph().clone();
        let atoms = self.runtime.atoms().clone();

        let mut wallet = graph.subscribe(&atoms.wallet_status);
        let mut provider = graph.subscribe(&atoms.provider);
        let mut positions = graph.subscribe(&atoms.current_positions);
        let mut balances = graph.subscribe(&atoms.current_balances);
        let mut pending = graph.subscribe(&atoms.pending_action);

        info!("Observing trading state, press Ctrl-C to stop");
        loop {
            tokio::select! {
                Some(result) = wallet.next() => {
                    log_result("wallet", result, |status| info!(%status, "Wallet status"));
                }
                Some(result) = provider.next() => {
                    log_result("provider", result, |provider| match provider {
                        Some(p) => info!(provider = %p.id, name = %p.name, max_leverage = p.max_leverage, "Provider"),
                        None => info!("No provider selected"),
                    });
                }
                Some(result) = positions.next() => {
                    log_result("positions", result, |positions| {
                        for p in &positions {
                            info!(
                                market = %p.market,
                                side = %p.side,
                                size = %p.size,
                                pnl = %p.unrealized_pnl(),
                                pending = p.pending_actions.len(),
                                "Position"
                            );
                        }
                        info!(count = positions.len(), "Positions updated");
                    });
                }
                Some(result) = balances.next() => {
                    log_result("balances", result, |balances| {
                        if let Some(b) = balances {
                            info!(equity = %b.total_equity(), assets = b.balances.len(), "Balances updated");
                        }
                    });
                }
                Some(result) = pending.next() => {
                    log_result("pending_action", result, |action| {
                        if let Some(a) = action {
                            info!(action = %a.id, kind = %a.kind, status = ?a.status, "Pending action");
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.runtime.shutdown();

        if let Ok(metrics) = Metrics::render() {
            debug!(%metrics, "Final metrics");
        }
        Ok(())
    }
}

fn log_result<T>(name: &str, result: NodeResult<T>, on_value: impl FnOnce(T)) {
    match result {
        Ok(value) => on_value(value),
        Err(err) => warn!(node = name, error = %err, "Node failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpdeck_wallet::WalletStatus;

    const OFFLINE_API: &str = "[api]\nbase_url = \"http://127.0.0.1:9\"\n";

    #[tokio::test]
    async fn test_read_only_runner_is_disconnected() {
        let app = Application::new(AppConfig::from_toml(OFFLINE_API).unwrap()).unwrap();
        let atoms = app.runtime().atoms();

        let status = app.runtime().graph().get(&atoms.wallet_status).await.unwrap();
        assert_eq!(status, WalletStatus::Disconnected);
        assert_eq!(app.runtime().graph().get(&atoms.account).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_wallet_connects_from_env_key() {
        std::env::set_var(
            "PERPDECK_APP_TEST_KEY",
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        );
        let toml = format!(
            "{OFFLINE_API}\n[wallet]\nkey = {{ type = \"env_var\", var_name = \"PERPDECK_APP_TEST_KEY\" }}\n"
        );
        let app = Application::new(AppConfig::from_toml(&toml).unwrap()).unwrap();
        app.select_provider(ProviderId::new("hl").unwrap());

        // The source reports Connecting first; wait for the connected account.
        let graph = app.runtime().graph();
        let mut account = None;
        for _ in 0..200 {
            account = graph.get(&app.runtime().atoms().account).await.unwrap();
            if account.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let account = account.expect("wallet connected");
        assert_eq!(account.address.as_str(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
        assert_eq!(account.provider.as_str(), "hl");
    }

    #[test]
    fn test_mismatched_key_refused() {
        std::env::set_var(
            "PERPDECK_APP_TEST_KEY_MISMATCH",
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        );
        let toml = format!(
            "{OFFLINE_API}\n[wallet]\nexpected_address = \"0x00000000000000000000000000000000000000aa\"\nkey = {{ type = \"env_var\", var_name = \"PERPDECK_APP_TEST_KEY_MISMATCH\" }}\n"
        );
        let result = Application::new(AppConfig::from_toml(&toml).unwrap());
        assert!(matches!(
            result,
            Err(crate::error::AppError::Wallet(perpdeck_wallet::WalletError::AddressMismatch { .. }))
        ));
    }
}
