//! Market and bet records for binary-outcome pari-mutuel markets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::address::Address;
use crate::pricing::Pools;

/// Side of a binary market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The question resolves true.
    #[strum(to_string = "yes", serialize = "YES", serialize = "true")]
    #[default]
    Yes,
    /// The question resolves false.
    #[strum(to_string = "no", serialize = "NO", serialize = "false")]
    No,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    /// Side from a boolean prediction (true = yes).
    pub fn from_bool(value: bool) -> Self {
        if value {
            Side::Yes
        } else {
            Side::No
        }
    }

    /// Boolean form of the side (yes = true).
    pub fn as_bool(&self) -> bool {
        matches!(self, Side::Yes)
    }
}

/// Lifecycle state of a market.
///
/// `Ended` is never stored; it is derived from the clock on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarketStatus {
    /// Accepting bets.
    Active,
    /// Past its end time, awaiting resolution.
    Ended,
    /// Outcome set, pools frozen.
    Resolved,
}

/// Typed metadata attached to a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketMetadata {
    /// Image shown alongside the question.
    ImageUrl {
        /// URL of the image.
        url: String,
    },
    /// Page with more context on the question.
    ExternalUrl {
        /// URL of the page.
        url: String,
    },
    /// Where the outcome will be determined.
    ResolutionSource {
        /// Description or URL of the source.
        source: String,
    },
    /// Entry with a tag this version does not understand, kept verbatim.
    Unknown {
        /// Raw tag byte.
        tag: u8,
        /// Raw payload.
        bytes: Vec<u8>,
    },
}

/// One binary-outcome question and its pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    /// Identity allowed to resolve the market.
    pub creator: Address,
    /// Question text.
    pub question: String,
    /// Longer description.
    pub description: String,
    /// Unix timestamp after which no bets are accepted.
    pub end_time: i64,
    /// Unix timestamp by which the market is expected to resolve.
    pub resolution_time: i64,
    /// Total staked on yes (smallest currency unit).
    pub total_yes_amount: u64,
    /// Total staked on no (smallest currency unit).
    pub total_no_amount: u64,
    /// Whether the outcome is set.
    pub resolved: bool,
    /// Outcome, present iff `resolved`.
    pub outcome: Option<Side>,
    /// Derivation nonce of the market address.
    pub bump: u8,
    /// Typed metadata entries.
    pub metadata: Vec<MarketMetadata>,
}

impl Market {
    /// Status at the given unix time.
    pub fn status(&self, now: i64) -> MarketStatus {
        if self.resolved {
            MarketStatus::Resolved
        } else if now >= self.end_time {
            MarketStatus::Ended
        } else {
            MarketStatus::Active
        }
    }

    /// Current pool totals.
    pub fn pools(&self) -> Pools {
        Pools::new(self.total_yes_amount, self.total_no_amount)
    }

    /// Pool total for one side.
    pub fn pool(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.total_yes_amount,
            Side::No => self.total_no_amount,
        }
    }

    /// Seconds until the market ends, or `None` once it has ended.
    pub fn time_remaining(&self, now: i64) -> Option<std::time::Duration> {
        let remaining = self.end_time - now;
        if remaining <= 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(remaining as u64))
        }
    }
}

/// One bettor's stake on one side of one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bet {
    /// Market the bet belongs to.
    pub market: Address,
    /// Identity of the bettor.
    pub bettor: Address,
    /// Staked amount, always positive.
    pub amount: u64,
    /// Predicted side.
    pub prediction: Side,
    /// Whether winnings have been claimed.
    pub claimed: bool,
    /// Derivation nonce of the bet address.
    pub bump: u8,
}

impl Bet {
    /// Whether this bet won the given outcome.
    pub fn wins(&self, outcome: Side) -> bool {
        self.prediction == outcome
    }
}
