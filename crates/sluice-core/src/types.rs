// crates/sluice-core/src/types.rs
//
// Account and token identifiers, amounts, and timestamps.
//
// Identifiers are 32-byte values rendered as 0x-prefixed lowercase hex. They
// serialize as hex strings so that TOML configs and JSON records stay
// readable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SluiceError;

/// Token amount in the token's smallest unit.
pub type Amount = u128;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// The all-zero identifier. Never a valid participant.
            pub const ZERO: Self = Self([0u8; 32]);

            /// Build an identifier whose 32 bytes all equal `b`. Handy in tests
            /// and scenario files.
            pub fn repeat_byte(b: u8) -> Self {
                Self([b; 32])
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Lowercase hex without the 0x prefix, used in storage keys.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = SluiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(raw).map_err(|e| {
                    SluiceError::InvalidInput(format!("bad hex identifier {:?}: {}", s, e))
                })?;
                let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
                    SluiceError::InvalidInput(format!(
                        "identifier must be 32 bytes, got {}",
                        v.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// A participant on the ledger: a staker, a recipient, an authority, or
    /// the engine's own custody account.
    Address
);

hex_id!(
    /// A fungible token tracked by the ledger. The underlying (stake) asset
    /// and every reward token share this identifier space.
    TokenId
);
