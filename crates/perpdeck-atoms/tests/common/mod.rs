//! Shared fixture: runtime over a mock API and a channel-fed wallet.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use perpdeck_api::MockApiClient;
use perpdeck_atoms::{Runtime, WidgetConfig};
use perpdeck_core::{AccountKey, Address, MarketId, Position, PositionId, Provider, ProviderId, Side};
use perpdeck_graph::{Atom, Graph};
use perpdeck_wallet::{Account, ChannelWalletSource, LocalSigner, TransactionSigner, WalletHandle};
use rust_decimal_macros::dec;

pub const CHAIN_ID: u64 = 42161;

pub struct Harness {
    pub runtime: Runtime,
    pub api: Arc<MockApiClient>,
    pub wallet: WalletHandle,
    pub signer: Arc<LocalSigner>,
}

pub fn provider_id(id: &str) -> ProviderId {
    ProviderId::new(id).unwrap()
}

pub fn provider(id: &str) -> Provider {
    Provider {
        id: provider_id(id),
        name: id.to_uppercase(),
        network: "arbitrum".to_string(),
        max_leverage: 50,
        markets: vec![MarketId::new("BTC").unwrap(), MarketId::new("ETH").unwrap()],
        enabled: true,
    }
}

pub fn position(id: &str, provider: &str) -> Position {
    Position {
        id: PositionId::new(id).unwrap(),
        provider: provider_id(provider),
        market: MarketId::new("BTC").unwrap(),
        side: Side::Long,
        size: dec!(0.25),
        entry_price: dec!(60000),
        mark_price: dec!(61000),
        leverage: 5,
        liquidation_price: None,
        take_profit: None,
        stop_loss: None,
        pending_actions: Vec::new(),
    }
}

impl Harness {
    /// Runtime with providers "hl" and "gmx" listed, optionally selecting one.
    pub fn new(default_provider: Option<&str>) -> Self {
        let api = Arc::new(MockApiClient::new());
        api.set_providers(vec![provider("hl"), provider("gmx")]);

        let (source, wallet) = ChannelWalletSource::new();
        let mut config = WidgetConfig::default();
        if let Some(id) = default_provider {
            config = config.with_default_provider(provider_id(id));
        }

        let runtime = Runtime::new(api.clone(), Arc::new(source), config);
        Self {
            runtime,
            api,
            wallet,
            signer: Arc::new(LocalSigner::random()),
        }
    }

    pub fn graph(&self) -> &Graph {
        self.runtime.graph()
    }

    pub fn address(&self) -> Address {
        self.signer.address().clone()
    }

    pub fn account(&self, provider: &str) -> AccountKey {
        AccountKey::new(self.address(), provider_id(provider))
    }

    pub fn connect(&self) {
        let signer: Arc<dyn TransactionSigner> = self.signer.clone();
        self.wallet
            .connect(Account::new(self.address(), CHAIN_ID), signer);
    }

    /// Connect and wait until the wallet node reports the address.
    pub async fn connect_and_wait(&self) {
        self.connect();
        let address = self.address();
        eventually(self.graph(), &self.runtime.atoms().wallet_address, |a| {
            a.as_ref() == Some(&address)
        })
        .await;
    }
}

/// Poll `atom` until `pred` holds, failing after two seconds.
pub async fn eventually<T, F>(graph: &Graph, atom: &Atom<T>, pred: F) -> T
where
    T: Clone + 'static,
    F: Fn(&T) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(Ok(value)) = tokio::time::timeout(Duration::from_millis(100), graph.get(atom)).await {
            if pred(&value) {
                return value;
            }
        }
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
