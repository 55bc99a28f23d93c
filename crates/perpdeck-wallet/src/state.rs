//! Wallet connection state and duplicate suppression.

use std::fmt;
use std::sync::Arc;

use perpdeck_core::Address;
use serde::{Deserialize, Serialize};

use crate::signer::TransactionSigner;

/// Coarse connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connected account details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub chain_id: u64,
    #[serde(default)]
    pub label: Option<String>,
}

impl Account {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self {
            address,
            chain_id,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A connected account together with the signer that controls it.
#[derive(Clone)]
pub struct ConnectedWallet {
    pub account: Account,
    pub signer: Arc<dyn TransactionSigner>,
}

impl fmt::Debug for ConnectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedWallet")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// State reported by a wallet source.
#[derive(Debug, Clone)]
pub enum WalletState {
    Disconnected,
    Connecting,
    Connected(ConnectedWallet),
}

impl WalletState {
    pub fn connected(account: Account, signer: Arc<dyn TransactionSigner>) -> Self {
        Self::Connected(ConnectedWallet { account, signer })
    }

    pub fn status(&self) -> WalletStatus {
        match self {
            Self::Disconnected => WalletStatus::Disconnected,
            Self::Connecting => WalletStatus::Connecting,
            Self::Connected(_) => WalletStatus::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Connected(wallet) => Some(&wallet.account),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<&Address> {
        self.account().map(|account| &account.address)
    }

    pub fn signer(&self) -> Option<Arc<dyn TransactionSigner>> {
        match self {
            Self::Connected(wallet) => Some(wallet.signer.clone()),
            _ => None,
        }
    }

    /// Whether `other` carries no semantic change relative to `self`.
    ///
    /// Two connected states are the same when their addresses match; chain
    /// and signer changes under the same address are not reported.
    pub fn is_same_as(&self, other: &WalletState) -> bool {
        match (self, other) {
            (Self::Connected(a), Self::Connected(b)) => a.account.address == b.account.address,
            (a, b) => a.status() == b.status(),
        }
    }
}

/// Suppresses consecutive duplicate wallet states.
#[derive(Debug, Default)]
pub struct WalletDedup {
    last: Option<WalletState>,
}

impl WalletDedup {
    /// Returns `true` if `next` differs from the last accepted state.
    pub fn accept(&mut self, next: &WalletState) -> bool {
        if let Some(last) = &self.last {
            if last.is_same_as(next) {
                return false;
            }
        }
        self.last = Some(next.clone());
        true
    }

    pub fn last(&self) -> Option<&WalletState> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::LocalSigner;

    fn connected(addr: &str) -> WalletState {
        let signer = Arc::new(LocalSigner::random());
        WalletState::connected(Account::new(Address::parse(addr).unwrap(), 42161), signer)
    }

    const A: &str = "0x00000000000000000000000000000000000000aa";
    const B: &str = "0x00000000000000000000000000000000000000bb";

    #[test]
    fn test_dedup_sequence() {
        let input = vec![
            connected(A),
            connected(A),
            connected(B),
            WalletState::Disconnected,
            WalletState::Disconnected,
        ];

        let mut dedup = WalletDedup::default();
        let forwarded: Vec<(WalletStatus, Option<String>)> = input
            .iter()
            .filter(|state| dedup.accept(state))
            .map(|state| (state.status(), state.address().map(|a| a.to_string())))
            .collect();

        assert_eq!(
            forwarded,
            vec![
                (WalletStatus::Connected, Some(A.to_string())),
                (WalletStatus::Connected, Some(B.to_string())),
                (WalletStatus::Disconnected, None),
            ]
        );
    }

    #[test]
    fn test_chain_change_same_address_suppressed() {
        let mut dedup = WalletDedup::default();
        let signer = Arc::new(LocalSigner::random());
        let mainnet = WalletState::connected(Account::new(Address::parse(A).unwrap(), 1), signer.clone());
        let arbitrum = WalletState::connected(Account::new(Address::parse(A).unwrap(), 42161), signer);

        assert!(dedup.accept(&mainnet));
        assert!(!dedup.accept(&arbitrum));
        assert!(dedup.accept(&WalletState::Connecting));
        assert!(dedup.accept(&mainnet));
    }
}
