//! Runtime: the capability registry.
//!
//! Built once at startup and passed by reference. It owns the graph, the API
//! client, the wallet bridge and the configuration, and constructs every
//! atom and mutation against them.

use std::sync::Arc;

use perpdeck_api::ApiClient;
use perpdeck_core::ProviderId;
use perpdeck_graph::Graph;
use perpdeck_wallet::{WalletBridge, WalletSource};
use tracing::info;

use crate::atoms::TradingAtoms;
use crate::config::WidgetConfig;
use crate::mutations::TradingMutations;

struct RuntimeInner {
    graph: Graph,
    api: Arc<dyn ApiClient>,
    bridge: Arc<WalletBridge>,
    atoms: TradingAtoms,
    mutations: TradingMutations,
}

/// Shared handle to the trading state core.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new(
        api: Arc<dyn ApiClient>,
        wallet_source: Arc<dyn WalletSource>,
        config: WidgetConfig,
    ) -> Self {
        let graph = Graph::new();
        let bridge = Arc::new(WalletBridge::new(wallet_source));
        let atoms = TradingAtoms::new(&graph, api.clone(), bridge.clone(), config);
        let mutations = TradingMutations::new(&graph, api.clone(), &atoms);
        info!(nodes = graph.node_count(), "Runtime created");

        Self {
            inner: Arc::new(RuntimeInner {
                graph,
                api,
                bridge,
                atoms,
                mutations,
            }),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.inner.graph
    }

    pub fn api(&self) -> &Arc<dyn ApiClient> {
        &self.inner.api
    }

    pub fn bridge(&self) -> &WalletBridge {
        &self.inner.bridge
    }

    pub fn atoms(&self) -> &TradingAtoms {
        &self.inner.atoms
    }

    pub fn mutations(&self) -> &TradingMutations {
        &self.inner.mutations
    }

    pub fn select_provider(&self, provider: Option<ProviderId>) {
        info!(provider = ?provider.as_ref().map(|p| p.as_str()), "Provider selected");
        self.inner
            .graph
            .set(&self.inner.atoms.selected_provider, provider);
    }

    /// Replace the widget configuration. Nodes reading it recompute.
    pub fn set_config(&self, config: WidgetConfig) {
        self.inner.graph.set(&self.inner.atoms.config, config);
    }

    /// Tear down every node and stop the wallet bridge.
    pub fn shutdown(&self) {
        if self.inner.graph.is_shutdown() {
            return;
        }
        self.inner.graph.shutdown();
        self.inner.bridge.shutdown();
        info!("Runtime shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.graph.is_shutdown()
    }
}
