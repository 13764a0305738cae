//! Display odds and implied probabilities.

use rust_decimal::Decimal;
use serde::Serialize;

use super::Pools;
use crate::market::Side;

/// Basis-point scale for integer probabilities.
pub const BPS_SCALE: u64 = 10_000;

/// Decimal odds for both sides (total pool / side pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Odds {
    /// Odds on yes.
    pub yes: Decimal,
    /// Odds on no.
    pub no: Decimal,
}

impl Odds {
    /// Odds for one side.
    pub fn side(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }
}

/// Current odds from pool totals.
///
/// While either side is empty there is no price information and both odds
/// are 1.
pub fn odds(pools: Pools) -> Odds {
    if pools.yes == 0 || pools.no == 0 {
        return Odds {
            yes: Decimal::ONE,
            no: Decimal::ONE,
        };
    }

    let yes = Decimal::from(pools.yes);
    let no = Decimal::from(pools.no);
    let total = yes + no;

    Odds {
        yes: total / yes,
        no: total / no,
    }
}

/// Implied probability of one side as a decimal in [0, 1].
///
/// An empty market is priced at one half for each side.
pub fn probability(pools: Pools, side: Side) -> Decimal {
    if pools.total() == 0 {
        return Decimal::new(5, 1);
    }
    let yes = Decimal::from(pools.yes);
    let no = Decimal::from(pools.no);
    Decimal::from(pools.side(side)) / (yes + no)
}

/// Implied probabilities in basis points, `(yes, no)`.
///
/// The no side is the complement of the yes side, so the pair always sums
/// to exactly [`BPS_SCALE`].
pub fn implied_probabilities_bps(pools: Pools) -> (u64, u64) {
    let total = pools.total();
    if total == 0 {
        return (BPS_SCALE / 2, BPS_SCALE / 2);
    }
    // yes <= total, so the quotient is at most BPS_SCALE.
    let yes = (pools.yes as u128 * BPS_SCALE as u128 / total) as u64;
    (yes, BPS_SCALE - yes)
}
