//! Trading atoms.
//!
//! Everything the front end reads lives here: the wallet root fed by the
//! wallet bridge, provider data pulled from the API, per-account families
//! keyed by [`AccountKey`], and the writable nodes mutations publish into.

use std::sync::Arc;

use perpdeck_api::ApiClient;
use perpdeck_core::{
    AccountBalances, AccountKey, Action, Address, Order, Position, Provider, ProviderId,
};
use perpdeck_graph::{Atom, Ctx, Family, Graph, NodeError, NodeResult, Writable};
use perpdeck_wallet::{WalletBridge, WalletState, WalletStatus};
use tracing::{debug, trace};

use crate::config::WidgetConfig;
use crate::signing::SigningState;
use crate::tags;

/// Handles to every trading node.
#[derive(Clone)]
pub struct TradingAtoms {
    pub config: Writable<WidgetConfig>,
    /// Latest wallet state. Pulled once from the bridge, then pushed.
    pub wallet: Atom<WalletState>,
    pub wallet_address: Atom<Option<Address>>,
    pub wallet_status: Atom<WalletStatus>,
    pub providers: Atom<Vec<Provider>>,
    pub selected_provider: Writable<Option<ProviderId>>,
    /// Details of the selected provider, if it is listed.
    pub provider: Atom<Option<Provider>>,
    /// Connected address on the selected provider.
    pub account: Atom<Option<AccountKey>>,
    pub positions: Family<AccountKey, Atom<Vec<Position>>>,
    pub orders: Family<AccountKey, Atom<Vec<Order>>>,
    pub balances: Family<AccountKey, Atom<AccountBalances>>,
    pub current_positions: Atom<Vec<Position>>,
    pub current_orders: Atom<Vec<Order>>,
    pub current_balances: Atom<Option<AccountBalances>>,
    /// Last action created by a mutation.
    pub pending_action: Writable<Option<Action>>,
    pub signing_state: Writable<SigningState>,
}

impl TradingAtoms {
    pub fn new(
        graph: &Graph,
        api: Arc<dyn ApiClient>,
        bridge: Arc<WalletBridge>,
        config: WidgetConfig,
    ) -> Self {
        let selected_provider = graph
            .builder("selected_provider")
            .keep_alive()
            .writable(config.default_provider.clone());
        let config = graph.builder("config").keep_alive().writable(config);

        let wallet = wallet_atom(graph, bridge);
        let wallet_address = graph.atom("wallet_address", move |ctx| async move {
            Ok(ctx.get(&wallet).await?.address().cloned())
        });
        let wallet_status = graph.atom("wallet_status", move |ctx| async move {
            Ok(ctx.get(&wallet).await?.status())
        });

        let providers = {
            let api = api.clone();
            graph
                .builder("providers")
                .keep_alive()
                .tag(tags::PROVIDERS)
                .build(move |ctx| {
                    let api = api.clone();
                    async move {
                        let refresh = ctx.get(&config).await?.providers_refresh();
                        ctx.refresh_after(refresh);
                        api.get_providers().await.map_err(NodeError::failed)
                    }
                })
        };

        let provider = graph.atom("provider", move |ctx| async move {
            let Some(selected) = ctx.get(&selected_provider).await? else {
                return Ok(None);
            };
            let listed = ctx.get(&providers).await?;
            let found = listed.into_iter().find(|p| p.id == selected);
            if found.is_none() {
                debug!(provider = %selected, "Selected provider not listed");
            }
            Ok(found)
        });

        let account = graph.atom("account", move |ctx| async move {
            let address = ctx.get(&wallet_address).await?;
            let provider = ctx.get(&selected_provider).await?;
            Ok(address.zip(provider).map(|(address, provider)| AccountKey::new(address, provider)))
        });

        let positions = {
            let api = api.clone();
            account_family(graph, "positions", tags::POSITIONS, move |ctx, key| {
                let api = api.clone();
                async move {
                    let refresh = ctx.get(&config).await?.positions_refresh();
                    ctx.refresh_after(refresh);
                    api.get_positions(key).await.map_err(NodeError::failed)
                }
            })
        };
        let orders = {
            let api = api.clone();
            account_family(graph, "orders", tags::ORDERS, move |ctx, key| {
                let api = api.clone();
                async move {
                    let refresh = ctx.get(&config).await?.orders_refresh();
                    ctx.refresh_after(refresh);
                    api.get_orders(key).await.map_err(NodeError::failed)
                }
            })
        };
        let balances = account_family(graph, "balances", tags::BALANCES, move |ctx, key| {
            let api = api.clone();
            async move {
                let refresh = ctx.get(&config).await?.balances_refresh();
                ctx.refresh_after(refresh);
                api.get_balances(key).await.map_err(NodeError::failed)
            }
        });

        let current_positions = {
            let positions = positions.clone();
            graph.atom("current_positions", move |ctx| {
                let positions = positions.clone();
                async move {
                    match ctx.get(&account).await? {
                        Some(key) => ctx.get(&positions.get(&key)).await,
                        None => Ok(Vec::new()),
                    }
                }
            })
        };
        let current_orders = {
            let orders = orders.clone();
            graph.atom("current_orders", move |ctx| {
                let orders = orders.clone();
                async move {
                    match ctx.get(&account).await? {
                        Some(key) => ctx.get(&orders.get(&key)).await,
                        None => Ok(Vec::new()),
                    }
                }
            })
        };
        let current_balances = {
            let balances = balances.clone();
            graph.atom("current_balances", move |ctx| {
                let balances = balances.clone();
                async move {
                    match ctx.get(&account).await? {
                        Some(key) => Ok(Some(ctx.get(&balances.get(&key)).await?)),
                        None => Ok(None),
                    }
                }
            })
        };

        let pending_action = graph.builder("pending_action").keep_alive().writable(None);
        let signing_state = graph
            .builder("signing_state")
            .keep_alive()
            .writable(SigningState::Idle);

        Self {
            config,
            wallet,
            wallet_address,
            wallet_status,
            providers,
            selected_provider,
            provider,
            account,
            positions,
            orders,
            balances,
            current_positions,
            current_orders,
            current_balances,
            pending_action,
            signing_state,
        }
    }
}

/// Root wallet node.
///
/// The first bridge state resolves the pull; a forwarder task then emits
/// every later state into the node until the cycle ends.
fn wallet_atom(graph: &Graph, bridge: Arc<WalletBridge>) -> Atom<WalletState> {
    graph.builder("wallet").keep_alive().build(move |ctx: Ctx| {
        let bridge = bridge.clone();
        async move {
            let mut states = bridge.subscribe().map_err(NodeError::failed)?;
            let first = states
                .recv()
                .await
                .ok_or_else(|| NodeError::message("wallet bridge closed"))?;

            let emitter = ctx.emitter::<WalletState>();
            let forwarder = tokio::spawn(async move {
                while let Some(state) = states.recv().await {
                    trace!(status = %state.status(), "Forwarding wallet state");
                    if !emitter.emit(state) {
                        break;
                    }
                }
            });
            ctx.add_finalizer(move || forwarder.abort());
            Ok(first)
        }
    })
}

/// Family of per-account nodes tagged with `tag`.
fn account_family<T, F, Fut>(
    graph: &Graph,
    name: &'static str,
    tag: &'static str,
    fetch: F,
) -> Family<AccountKey, Atom<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Ctx, AccountKey) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = NodeResult<T>> + Send + 'static,
{
    Family::new(graph, move |graph, key: &AccountKey| {
        let fetch = fetch.clone();
        let key = key.clone();
        graph
            .builder(format!("{name}/{key}"))
            .tag(tag)
            .build(move |ctx| fetch(ctx, key.clone()))
    })
}
