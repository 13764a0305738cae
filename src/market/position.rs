//! Position tracking.

use rust_decimal::Decimal;
use serde::Serialize;

use super::types::{Bet, Market, MarketStatus, Side};
use crate::address::Address;
use crate::error::Result;
use crate::pricing;

/// A bettor's exposure in one market, derived from their bet and the
/// market's current pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Market address.
    pub market: Address,
    /// Bettor identity.
    pub bettor: Address,
    /// Side backed.
    pub side: Side,
    /// Total staked.
    pub stake: u64,
    /// Market status when the position was computed.
    pub status: MarketStatus,
    /// Payout at current pools while open; final payout (or zero) once
    /// resolved.
    pub current_value: u64,
    /// `current_value - stake`.
    pub unrealized_pnl: i128,
    /// Display odds of the backed side.
    pub odds: Decimal,
    /// Whether winnings were claimed.
    pub claimed: bool,
}

impl Position {
    /// Compute the position of `bet` in `market` at unix time `now`.
    pub fn from_bet(bet: &Bet, market: &Market, now: i64) -> Result<Self> {
        let pools = market.pools();
        let current_value = match market.outcome {
            Some(outcome) if !bet.wins(outcome) => 0,
            _ => pricing::payout(bet.amount, bet.prediction, pools)?,
        };

        Ok(Self {
            market: bet.market,
            bettor: bet.bettor,
            side: bet.prediction,
            stake: bet.amount,
            status: market.status(now),
            current_value,
            unrealized_pnl: i128::from(current_value) - i128::from(bet.amount),
            odds: pricing::odds(pools).side(bet.prediction),
            claimed: bet.claimed,
        })
    }

    /// Calculate the cost basis.
    pub fn cost_basis(&self) -> u64 {
        self.stake
    }

    /// Whether the position can still be claimed.
    pub fn is_claimable(&self) -> bool {
        self.status == MarketStatus::Resolved && !self.claimed && self.current_value > 0
    }
}
