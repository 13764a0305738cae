//! Deterministic account addresses.
//!
//! Every account the ledger touches lives at an address derived from a
//! namespace and a list of seeds, so any caller can recompute it without a
//! storage lookup:
//!
//! ```text
//! market  = derive("market", [creator, question[0..32]])
//! bet     = derive("bet",    [market, bettor])
//! event   = derive("event",  [event_id])
//! oracle  = derive("oracle", [event_id])
//! ```
//!
//! Derivation hashes the namespace, the seeds, a one-byte nonce and the
//! program id with keccak256. Results that land in the reserved half of the
//! address space (see [`is_reserved`]) are rejected and the nonce is
//! decremented, starting from 255, until a usable address is found.

mod derive;

pub use derive::{is_reserved, AddressDeriver, MAX_SEEDS, MAX_SEED_LEN};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressError;

/// Size of an address or identity in bytes.
pub const ADDRESS_LEN: usize = 32;

/// A 32-byte account address or account-holder identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| AddressError::InvalidLength {
            expected: ADDRESS_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Short form for logs: first four bytes as hex.
    pub fn short(&self) -> String {
        format!("0x{}..", hex::encode(&self.0[..4]))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parse a hex address, with or without the "0x" prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Namespaces used as the first derivation seed.
pub mod namespace {
    /// Market accounts.
    pub const MARKET: &[u8] = b"market";
    /// Bet accounts.
    pub const BET: &[u8] = b"bet";
    /// Oracle event accounts.
    pub const EVENT: &[u8] = b"event";
    /// Oracle assertion accounts.
    pub const ORACLE: &[u8] = b"oracle";
}

/// Number of question bytes mixed into a market address.
pub const QUESTION_SEED_LEN: usize = 32;

/// Truncate a question to the bytes used as its address seed.
pub fn question_seed(question: &str) -> &[u8] {
    let bytes = question.as_bytes();
    &bytes[..bytes.len().min(QUESTION_SEED_LEN)]
}
