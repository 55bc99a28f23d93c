//! Transaction signing.
//!
//! `LocalSigner` signs the keccak256 hash of each transaction payload with a
//! secp256k1 key. Signatures are encoded as 65 bytes `r || s || v` with
//! `v` in {27, 28}.

use std::fmt;
use std::path::PathBuf;

use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use perpdeck_core::{Address, BoxFuture, SignedTransaction, UnsignedTransaction};
use perpdeck_telemetry::Metrics;
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Signs action transactions on behalf of one account.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> &Address;

    /// Sign every transaction, in order. Fails on the first error.
    fn sign_transactions(
        &self,
        transactions: Vec<UnsignedTransaction>,
    ) -> BoxFuture<'_, WalletResult<Vec<SignedTransaction>>>;
}

/// Source of a private key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySource {
    /// Environment variable holding the hex key.
    EnvVar { var_name: String },
    /// File holding the hex key (keep it 0600).
    File { path: PathBuf },
}

fn parse_hex_key(raw: &str) -> WalletResult<Zeroizing<Vec<u8>>> {
    let trimmed = raw.trim().trim_start_matches("0x");
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

fn to_address(address: alloy::primitives::Address) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(address.as_slice());
    Address::from_bytes(bytes)
}

/// Signer backed by a local private key.
///
/// Never log key material; only the derived address is exposed.
pub struct LocalSigner {
    inner: PrivateKeySigner,
    address: Address,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Load a key and optionally verify the derived address.
    pub fn load(source: &KeySource, expected: Option<&Address>) -> WalletResult<Self> {
        let secret = match source {
            KeySource::EnvVar { var_name } => {
                let hex = std::env::var(var_name)
                    .map_err(|_| WalletError::EnvVarNotFound(var_name.clone()))?;
                parse_hex_key(&hex)?
            }
            KeySource::File { path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                parse_hex_key(&content)?
            }
        };
        let signer = Self::from_bytes(&secret)?;

        if let Some(expected) = expected {
            if signer.address() != expected {
                return Err(WalletError::AddressMismatch {
                    expected: expected.clone(),
                    actual: signer.address,
                });
            }
        }
        Ok(signer)
    }

    pub fn from_bytes(secret: &[u8]) -> WalletResult<Self> {
        let inner = PrivateKeySigner::from_slice(secret)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signer(inner))
    }

    /// Fresh random key. Useful for tests and throwaway sessions.
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    fn from_signer(inner: PrivateKeySigner) -> Self {
        let address = to_address(inner.address());
        Self { inner, address }
    }

    /// Sign one hex payload, returning the `0x`-prefixed 65-byte signature.
    pub async fn sign_payload(&self, payload: &str) -> WalletResult<String> {
        let bytes = hex::decode(payload.trim().trim_start_matches("0x"))?;
        let hash = keccak256(&bytes);
        let signature = self
            .inner
            .sign_hash(&hash)
            .await
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        let mut encoded = Vec::with_capacity(65);
        encoded.extend_from_slice(&signature.r().to_be_bytes::<32>());
        encoded.extend_from_slice(&signature.s().to_be_bytes::<32>());
        encoded.push(27 + signature.v() as u8);
        Ok(format!("0x{}", hex::encode(encoded)))
    }
}

impl TransactionSigner for LocalSigner {
    fn address(&self) -> &Address {
        &self.address
    }

    fn sign_transactions(
        &self,
        transactions: Vec<UnsignedTransaction>,
    ) -> BoxFuture<'_, WalletResult<Vec<SignedTransaction>>> {
        Box::pin(async move {
            let mut signed = Vec::with_capacity(transactions.len());
            for tx in transactions {
                let signature = self.sign_payload(&tx.payload).await.map_err(|e| match e {
                    WalletError::HexDecode(err) => WalletError::InvalidPayload {
                        id: tx.id.clone(),
                        reason: err.to_string(),
                    },
                    other => other,
                })?;
                debug!(tx = %tx.id, network = %tx.network, "Transaction signed");
                signed.push(SignedTransaction {
                    transaction_id: tx.id,
                    payload: tx.payload,
                    signature,
                });
            }
            Metrics::transactions_signed(signed.len());
            Ok(signed)
        })
    }
}
