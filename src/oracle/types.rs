//! Oracle record types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::market::Side;

/// Width of an event id on the wire.
pub const EVENT_ID_LEN: usize = 32;

/// Identifier of an oracle event: up to 32 bytes of UTF-8 with no NUL bytes.
///
/// Stored NUL-padded to 32 bytes; derivation seeds use the unpadded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Validate and wrap an id.
    pub fn new(id: impl Into<String>) -> Result<Self, CodecError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CodecError::InvalidValue {
                field: "event_id",
                reason: "empty",
            });
        }
        if id.len() > EVENT_ID_LEN {
            return Err(CodecError::FieldTooLong {
                field: "event_id",
                len: id.len(),
            });
        }
        if id.contains('\0') {
            return Err(CodecError::InvalidValue {
                field: "event_id",
                reason: "contains NUL",
            });
        }
        Ok(Self(id))
    }

    /// Parse the NUL-padded wire form.
    pub fn from_padded(raw: &[u8]) -> Result<Self, CodecError> {
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        if raw[end..].iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidValue {
                field: "event_id",
                reason: "bytes after NUL padding",
            });
        }
        let id = std::str::from_utf8(&raw[..end])
            .map_err(|_| CodecError::InvalidUtf8 { field: "event_id" })?;
        Self::new(id)
    }

    /// NUL-padded wire form.
    pub fn to_padded(&self) -> [u8; EVENT_ID_LEN] {
        let mut out = [0u8; EVENT_ID_LEN];
        out[..self.0.len()].copy_from_slice(self.0.as_bytes());
        out
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Seed bytes used for address derivation.
    pub fn seed(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EventId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Map a raw oracle outcome onto a market side. Only 0 (no) and 1 (yes)
/// are binary.
pub fn binary_outcome(value: u32) -> Option<Side> {
    match value {
        0 => Some(Side::No),
        1 => Some(Side::Yes),
        _ => None,
    }
}

/// An event tracked by the oracle program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAccount {
    /// Event identifier.
    pub event_id: EventId,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Free-form category.
    pub category: String,
    /// Unix time the event ends.
    pub end_time: i64,
    /// Whether the oracle has settled the event.
    pub resolved: bool,
    /// Settled outcome, if any.
    pub outcome: Option<u32>,
    /// Volume reported by the oracle program.
    pub total_volume: u64,
    /// Number of participants reported by the oracle program.
    pub participants: u32,
}

impl EventAccount {
    /// Whether the event is still open at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        !self.resolved && now < self.end_time
    }
}

/// An oracle's assertion about an event outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleAssertion {
    /// Event the assertion is about.
    pub event_id: EventId,
    /// Asserted outcome, if any.
    pub outcome: Option<u32>,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Unix time of the assertion.
    pub timestamp: i64,
    /// Where the outcome came from.
    pub source: String,
    /// Whether the assertion has been verified.
    pub verified: bool,
}

impl OracleAssertion {
    /// Asserted outcome as a market side, `None` if absent or not binary.
    pub fn side(&self) -> Option<Side> {
        self.outcome.and_then(binary_outcome)
    }
}
