//! Wallet bridge: one shared subscription to the wallet source.
//!
//! The bridge subscribes to its source on first use, suppresses duplicate
//! states and fans the rest out to every subscriber in source order. A
//! subscriber that joins late first receives the latest forwarded state.
//! All buffering is unbounded; no transition is dropped.

use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use perpdeck_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::{WalletError, WalletResult};
use crate::source::WalletSource;
use crate::state::{WalletDedup, WalletState};

#[derive(Default)]
struct Fanout {
    latest: Option<WalletState>,
    subscribers: Vec<mpsc::UnboundedSender<WalletState>>,
}

/// Shared, de-duplicated view of a wallet source.
pub struct WalletBridge {
    source: Arc<dyn WalletSource>,
    fanout: Arc<Mutex<Fanout>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl WalletBridge {
    pub fn new(source: Arc<dyn WalletSource>) -> Self {
        Self {
            source,
            fanout: Arc::new(Mutex::new(Fanout::default())),
            pump: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Receive forwarded states, starting the pump on first call.
    pub fn subscribe(&self) -> WalletResult<WalletSubscription> {
        self.ensure_started()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut fanout = self.fanout.lock();
        if let Some(latest) = &fanout.latest {
            let _ = tx.send(latest.clone());
        }
        fanout.subscribers.push(tx);
        trace!(subscribers = fanout.subscribers.len(), "Wallet bridge subscriber added");
        Ok(WalletSubscription { rx })
    }

    fn ensure_started(&self) -> WalletResult<()> {
        let mut pump = self.pump.lock();
        if self.shutdown.is_cancelled() {
            return Err(WalletError::Closed);
        }
        if pump.is_some() {
            return Ok(());
        }

        let states = self.source.subscribe()?;
        info!("Wallet bridge started");
        *pump = Some(tokio::spawn(run_pump(
            states,
            self.fanout.clone(),
            self.shutdown.clone(),
        )));
        Ok(())
    }

    /// Latest forwarded state, if any.
    pub fn latest(&self) -> Option<WalletState> {
        self.fanout.lock().latest.clone()
    }

    pub fn is_started(&self) -> bool {
        self.pump.lock().is_some()
    }

    /// Stop the pump. Subscriptions end after draining what they already hold.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.fanout.lock().subscribers.clear();
        debug!("Wallet bridge shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for WalletBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_pump(
    mut states: BoxStream<'static, WalletState>,
    fanout: Arc<Mutex<Fanout>>,
    shutdown: CancellationToken,
) {
    let mut dedup = WalletDedup::default();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Wallet bridge pump cancelled");
                break;
            }
            next = states.next() => {
                let Some(state) = next else {
                    info!("Wallet source ended");
                    break;
                };
                if !dedup.accept(&state) {
                    Metrics::wallet_suppressed();
                    trace!(status = %state.status(), "Duplicate wallet state suppressed");
                    continue;
                }

                Metrics::wallet_transition(state.status().as_str());
                info!(
                    status = %state.status(),
                    address = ?state.address().map(|a| a.short()),
                    "Wallet state changed"
                );

                let mut fanout = fanout.lock();
                fanout.latest = Some(state.clone());
                fanout.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
            }
        }
    }
}

/// Receiving end of a bridge subscription.
pub struct WalletSubscription {
    rx: mpsc::UnboundedReceiver<WalletState>,
}

impl WalletSubscription {
    /// Next state; `None` once the bridge is shut down and drained.
    pub async fn recv(&mut self) -> Option<WalletState> {
        self.rx.recv().await
    }
}
