//! Pari-mutuel pricing.
//!
//! Winners split the whole pool in proportion to their stake:
//!
//! ```text
//! pools:   yes = 300, no = 100          (total 400)
//! odds:    yes = 400/300 = 1.33, no = 400/100 = 4.00
//! payout:  50 staked on no, no wins  => 50 * 400 / 100 = 200
//! ```
//!
//! Settlement uses integer arithmetic only. Division truncates; the
//! remainder stays in the pool and is never paid out. Display odds and
//! probabilities use [`rust_decimal::Decimal`].

pub mod odds;
pub mod payout;

pub use odds::{implied_probabilities_bps, odds, probability, Odds, BPS_SCALE};
pub use payout::{payout, potential_payout, settle, Settlement};

use serde::Serialize;

use crate::market::Side;

/// Pool totals for both sides of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Pools {
    /// Total staked on yes.
    pub yes: u64,
    /// Total staked on no.
    pub no: u64,
}

impl Pools {
    /// Create pool totals.
    pub const fn new(yes: u64, no: u64) -> Self {
        Self { yes, no }
    }

    /// Combined pool, widened so it cannot overflow.
    pub fn total(&self) -> u128 {
        self.yes as u128 + self.no as u128
    }

    /// Pool for one side.
    pub fn side(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    /// Pools after adding a stake to one side, or `None` once the combined
    /// pool would exceed `u64::MAX`.
    pub fn with_stake(&self, side: Side, amount: u64) -> Option<Self> {
        let pools = match side {
            Side::Yes => Self::new(self.yes.checked_add(amount)?, self.no),
            Side::No => Self::new(self.yes, self.no.checked_add(amount)?),
        };
        // The combined pool must fit in a u64 so every payout does too.
        pools.yes.checked_add(pools.no)?;
        Some(pools)
    }
}
