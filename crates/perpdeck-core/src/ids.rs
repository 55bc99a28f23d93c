//! Identifier newtypes.
//!
//! Identifiers compare by value, so they can key families and maps
//! (`AccountKey` is the key of every per-account family).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EVM account address, normalized to lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Length of the hex body (20 bytes).
    const HEX_LEN: usize = 40;

    /// Parse and normalize an address.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| CoreError::InvalidAddress(raw.to_string()))?;

        if body.len() != Self::HEX_LEN || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidAddress(raw.to_string()));
        }

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Address from raw 20 bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        let body: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("0x{body}"))
    }

    /// Address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs (`0x1234…abcd`).
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier. Empty identifiers are rejected.
            pub fn new(id: impl Into<String>) -> Result<Self> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(CoreError::InvalidId(stringify!($name).to_string()));
                }
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Perpetuals provider identifier (e.g. "hyperliquid").
    ProviderId
);
string_id!(
    /// Market symbol within a provider (e.g. "BTC-PERP").
    MarketId
);
string_id!(
    /// Exchange-assigned order identifier.
    OrderId
);
string_id!(
    /// Provider-assigned position identifier.
    PositionId
);
string_id!(
    /// Identifier of an action created by the API.
    ActionId
);

/// Key for per-account data: one wallet address on one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub address: Address,
    pub provider: ProviderId,
}

impl AccountKey {
    pub fn new(address: Address, provider: ProviderId) -> Self {
        Self { address, provider }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address.short(), self.provider)
    }
}
