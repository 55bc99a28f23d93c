//! Wallet integration for perpdeck.
//!
//! - `WalletSource`: external producer of connection states
//! - `WalletBridge`: single shared, de-duplicated subscription to a source
//! - `TransactionSigner` / `LocalSigner`: signing of action transactions

pub mod bridge;
pub mod error;
pub mod signer;
pub mod source;
pub mod state;

pub use bridge::{WalletBridge, WalletSubscription};
pub use error::{WalletError, WalletResult};
pub use signer::{KeySource, LocalSigner, TransactionSigner};
pub use source::{ChannelWalletSource, LocalWalletSource, WalletHandle, WalletSource};
pub use state::{Account, ConnectedWallet, WalletDedup, WalletState, WalletStatus};
