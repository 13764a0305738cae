//! Settlement arithmetic.

use serde::Serialize;

use super::Pools;
use crate::error::LedgerError;
use crate::market::Side;

/// Payout for a winning stake: `stake * total / winning_pool`.
///
/// Truncates toward zero. If nobody backed the winning side the payout is
/// zero and the pool is retained.
pub fn payout(stake: u64, prediction: Side, pools: Pools) -> Result<u64, LedgerError> {
    let winning_pool = pools.side(prediction) as u128;
    if winning_pool == 0 {
        return Ok(0);
    }

    let gross = (stake as u128)
        .checked_mul(pools.total())
        .ok_or(LedgerError::MathOverflow { context: "payout" })?;

    u64::try_from(gross / winning_pool).map_err(|_| LedgerError::MathOverflow { context: "payout" })
}

/// Payout a new stake would earn if its side won, priced against the pools
/// after the stake is added.
pub fn potential_payout(stake: u64, prediction: Side, pools: Pools) -> Result<u64, LedgerError> {
    let after = pools
        .with_stake(prediction, stake)
        .ok_or(LedgerError::MathOverflow {
            context: "potential payout",
        })?;
    payout(stake, prediction, after)
}

/// Totals for settling every bet on a resolved market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Settlement {
    /// Number of winning bets.
    pub winners: usize,
    /// Sum of all winning payouts.
    pub total_paid: u128,
    /// Pool left unpaid after truncation, or the whole pool if the winning
    /// side is empty.
    pub retained: u128,
}

/// Settle a set of `(stake, prediction)` pairs against the final pools.
pub fn settle<I>(pools: Pools, outcome: Side, bets: I) -> Result<Settlement, LedgerError>
where
    I: IntoIterator<Item = (u64, Side)>,
{
    let mut settlement = Settlement::default();

    for (stake, prediction) in bets {
        if prediction != outcome {
            continue;
        }
        settlement.winners += 1;
        settlement.total_paid += payout(stake, prediction, pools)? as u128;
    }

    settlement.retained = pools.total().saturating_sub(settlement.total_paid);
    Ok(settlement)
}
