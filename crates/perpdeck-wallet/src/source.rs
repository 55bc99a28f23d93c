//! Wallet sources: where connection states come from.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{WalletError, WalletResult};
use crate::signer::{LocalSigner, TransactionSigner};
use crate::state::{Account, WalletState};

/// External producer of wallet states.
pub trait WalletSource: Send + Sync {
    /// Start receiving states. Sources may accept only one subscriber.
    fn subscribe(&self) -> WalletResult<BoxStream<'static, WalletState>>;
}

fn receiver_stream(rx: mpsc::UnboundedReceiver<WalletState>) -> BoxStream<'static, WalletState> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|state| (state, rx)) }).boxed()
}

/// Source fed through a [`WalletHandle`]. Single consumer.
pub struct ChannelWalletSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<WalletState>>>,
}

/// Pushes states into a [`ChannelWalletSource`].
#[derive(Clone)]
pub struct WalletHandle {
    tx: mpsc::UnboundedSender<WalletState>,
}

impl ChannelWalletSource {
    pub fn new() -> (Self, WalletHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            WalletHandle { tx },
        )
    }
}

impl WalletSource for ChannelWalletSource {
    fn subscribe(&self) -> WalletResult<BoxStream<'static, WalletState>> {
        let rx = self.rx.lock().take().ok_or(WalletError::AlreadySubscribed)?;
        Ok(receiver_stream(rx))
    }
}

impl WalletHandle {
    /// Push a state. Returns `false` once the consumer is gone.
    pub fn send(&self, state: WalletState) -> bool {
        self.tx.send(state).is_ok()
    }

    pub fn disconnect(&self) -> bool {
        self.send(WalletState::Disconnected)
    }

    pub fn connecting(&self) -> bool {
        self.send(WalletState::Connecting)
    }

    pub fn connect(&self, account: Account, signer: Arc<dyn TransactionSigner>) -> bool {
        self.send(WalletState::connected(account, signer))
    }
}

/// Wallet backed by a local key: reports `Connecting`, then `Connected`.
///
/// Later states can be pushed through [`LocalWalletSource::handle`].
pub struct LocalWalletSource {
    signer: Arc<LocalSigner>,
    chain_id: u64,
    label: Option<String>,
    channel: ChannelWalletSource,
    handle: WalletHandle,
}

impl LocalWalletSource {
    pub fn new(signer: LocalSigner, chain_id: u64) -> Self {
        let (channel, handle) = ChannelWalletSource::new();
        Self {
            signer: Arc::new(signer),
            chain_id,
            label: None,
            channel,
            handle,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn handle(&self) -> WalletHandle {
        self.handle.clone()
    }

    fn account(&self) -> Account {
        Account {
            address: self.signer.address().clone(),
            chain_id: self.chain_id,
            label: self.label.clone(),
        }
    }
}

impl WalletSource for LocalWalletSource {
    fn subscribe(&self) -> WalletResult<BoxStream<'static, WalletState>> {
        let later = self.channel.subscribe()?;
        let account = self.account();
        debug!(address = %account.address.short(), chain_id = account.chain_id, "Local wallet subscribed");
        let signer: Arc<dyn TransactionSigner> = self.signer.clone();
        let initial = vec![
            WalletState::Connecting,
            WalletState::connected(account, signer),
        ];
        Ok(stream::iter(initial).chain(later).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WalletStatus;

    #[tokio::test]
    async fn test_channel_source_single_consumer() {
        let (source, handle) = ChannelWalletSource::new();
        let mut states = source.subscribe().unwrap();
        assert!(matches!(source.subscribe(), Err(WalletError::AlreadySubscribed)));

        assert!(handle.connecting());
        assert!(handle.disconnect());
        assert_eq!(states.next().await.unwrap().status(), WalletStatus::Connecting);
        assert_eq!(states.next().await.unwrap().status(), WalletStatus::Disconnected);

        drop(handle);
        assert!(states.next().await.is_none());
    }

    #[tokio::test]
    async fn test_local_source_connects() {
        let signer = LocalSigner::random();
        let address = signer.address().clone();
        let source = LocalWalletSource::new(signer, 42161).with_label("dev");
        let handle = source.handle();
        let mut states = source.subscribe().unwrap();

        assert_eq!(states.next().await.unwrap().status(), WalletStatus::Connecting);
        let connected = states.next().await.unwrap();
        assert_eq!(connected.address(), Some(&address));
        assert_eq!(connected.account().and_then(|a| a.label.clone()), Some("dev".to_string()));

        handle.disconnect();
        assert_eq!(states.next().await.unwrap().status(), WalletStatus::Disconnected);
    }
}
