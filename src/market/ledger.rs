//! Market Ledger: market lifecycle, bets, resolution and claims.
//!
//! Every mutation runs under the market's lock, builds the new records,
//! encodes them and commits them to the store in one batch. The in-memory
//! maps are updated only after the commit succeeds, so a failed, timed-out
//! or cancelled operation leaves no visible change.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, warn};

use super::position::Position;
use super::store::{with_timeout, AccountStore};
use super::types::{Bet, Market, MarketMetadata, MarketStatus, Side};
use crate::address::{namespace, question_seed, Address, AddressDeriver};
use crate::codec::{self, AccountKind};
use crate::error::{CodecError, ErrorClass, LedgerError, Result};
use crate::metrics;
use crate::oracle::{EventId, OracleReader};
use crate::pricing::{self, Odds, Settlement};
use crate::utils::{format_timestamp, Clock, SystemClock};

/// Maximum question length in bytes.
pub const MAX_QUESTION_LEN: usize = 200;
/// Maximum description length in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Ledger settings.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Timeout around every store call.
    pub rpc_timeout: Duration,
    /// Whether the creator may resolve before the end time.
    pub allow_early_resolution: bool,
    /// Minimum oracle confidence accepted by [`MarketLedger::resolve_with_oracle`].
    pub oracle_min_confidence: f32,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(2),
            allow_early_resolution: false,
            oracle_min_confidence: 0.5,
        }
    }
}

/// Parameters for a new market.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMarket {
    /// Identity allowed to resolve the market.
    pub creator: Address,
    /// Question text, 1 to 200 bytes.
    pub question: String,
    /// Description, up to 500 bytes.
    #[serde(default)]
    pub description: String,
    /// Unix time betting closes; must be in the future.
    pub end_time: i64,
    /// Unix time the market should be resolved by; not before `end_time`.
    pub resolution_time: i64,
    /// Optional metadata entries.
    #[serde(default)]
    pub metadata: Vec<MarketMetadata>,
}

/// Result of an accepted bet.
#[derive(Debug, Clone, Serialize)]
pub struct BetPlaced {
    /// Address of the bet account.
    pub address: Address,
    /// The bet after this stake.
    pub bet: Bet,
    /// The bettor's position after this stake.
    pub position: Position,
}

/// Implied probabilities in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbabilityBps {
    /// Yes side.
    pub yes: u64,
    /// No side.
    pub no: u64,
}

/// A market with its derived pricing.
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    /// Market address.
    pub address: Address,
    /// Stored record.
    #[serde(flatten)]
    pub market: Market,
    /// Status at the time of the view.
    pub status: MarketStatus,
    /// Display odds.
    pub odds: Odds,
    /// Implied probabilities.
    pub probability_bps: ProbabilityBps,
    /// Sum of both pools.
    pub total_volume: u128,
    /// Seconds until betting closes, if still open.
    pub seconds_remaining: Option<u64>,
}

impl MarketView {
    fn new(address: Address, market: Market, now: i64) -> Self {
        let pools = market.pools();
        let (yes, no) = pricing::implied_probabilities_bps(pools);
        Self {
            address,
            status: market.status(now),
            odds: pricing::odds(pools),
            probability_bps: ProbabilityBps { yes, no },
            total_volume: pools.total(),
            seconds_remaining: market.time_remaining(now).map(|d| d.as_secs()),
            market,
        }
    }
}

/// Aggregate ledger statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Number of markets.
    pub total_markets: usize,
    /// Markets accepting bets.
    pub active_markets: usize,
    /// Markets past their end time, unresolved.
    pub ended_markets: usize,
    /// Resolved markets.
    pub resolved_markets: usize,
    /// Number of bet accounts.
    pub total_bets: usize,
    /// Distinct bettors.
    pub unique_bettors: usize,
    /// Sum of every pool.
    pub total_volume: u128,
}

/// Authoritative store of markets and bets.
pub struct MarketLedger<S> {
    store: Arc<S>,
    deriver: AddressDeriver,
    clock: Arc<dyn Clock>,
    options: LedgerOptions,
    markets: DashMap<Address, Market>,
    bets: DashMap<Address, Bet>,
    locks: DashMap<Address, Arc<Mutex<()>>>,
    // Shared by mutations, exclusive for hydrate.
    hydration: RwLock<()>,
}

/// Held for the duration of a mutation on one market.
struct MarketGuard<'a> {
    _hydration: RwLockReadGuard<'a, ()>,
    _market: OwnedMutexGuard<()>,
}

impl<S: AccountStore> MarketLedger<S> {
    /// Create an empty ledger using the system clock.
    pub fn new(store: Arc<S>, deriver: AddressDeriver, options: LedgerOptions) -> Self {
        Self::with_clock(store, deriver, options, Arc::new(SystemClock))
    }

    /// Create an empty ledger with an explicit clock.
    pub fn with_clock(
        store: Arc<S>,
        deriver: AddressDeriver,
        options: LedgerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            deriver,
            clock,
            options,
            markets: DashMap::new(),
            bets: DashMap::new(),
            locks: DashMap::new(),
            hydration: RwLock::new(()),
        }
    }

    /// Address deriver in use.
    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Ledger settings.
    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// Current unix time according to the ledger's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    // === Mutations ===

    /// Create a market with empty pools.
    #[instrument(skip_all, fields(creator = %params.creator))]
    pub async fn create_market(&self, params: NewMarket) -> Result<(Address, Market)> {
        logged("create_market", self.create_market_inner(params).await)
    }

    async fn create_market_inner(&self, params: NewMarket) -> Result<(Address, Market)> {
        validate_text(&params.question, &params.description)?;

        let now = self.clock.now();
        if params.end_time <= now {
            return Err(LedgerError::InvalidSchedule {
                reason: format!("end time {} is not after now ({now})", params.end_time),
            });
        }
        if params.resolution_time < params.end_time {
            return Err(LedgerError::InvalidSchedule {
                reason: format!(
                    "resolution time {} is before end time {}",
                    params.resolution_time, params.end_time
                ),
            });
        }

        let (address, bump) = self
            .deriver
            .market_address(&params.creator, &params.question)?;
        let _guard = self.lock(address).await;

        if self.markets.contains_key(&address) {
            return Err(LedgerError::MarketExists { market: address });
        }
        // The store may hold accounts this ledger has not hydrated.
        let existing = with_timeout(self.options.rpc_timeout, self.store.get_account(&address))
            .await
            .map_err(|e| unavailable("create_market", e))?;
        if existing.is_some() {
            return Err(LedgerError::MarketExists { market: address });
        }

        let market = Market {
            creator: params.creator,
            question: params.question,
            description: params.description,
            end_time: params.end_time,
            resolution_time: params.resolution_time,
            total_yes_amount: 0,
            total_no_amount: 0,
            resolved: false,
            outcome: None,
            bump,
            metadata: params.metadata,
        };

        let bytes = codec::encode(&market)?;
        self.persist("create_market", vec![(address, bytes)]).await?;
        self.markets.insert(address, market.clone());

        metrics::inc_markets_created();
        info!(
            market = %address,
            end = %format_timestamp(market.end_time),
            "Market created"
        );
        Ok((address, market))
    }

    /// Stake `amount` on `prediction`. A repeat bet by the same bettor tops
    /// up their existing bet and must back the same side.
    #[instrument(skip(self), fields(market = %market, bettor = %bettor))]
    pub async fn place_bet(
        &self,
        market: Address,
        bettor: Address,
        amount: u64,
        prediction: Side,
    ) -> Result<BetPlaced> {
        logged(
            "place_bet",
            self.place_bet_inner(market, bettor, amount, prediction).await,
        )
    }

    async fn place_bet_inner(
        &self,
        market_address: Address,
        bettor: Address,
        amount: u64,
        prediction: Side,
    ) -> Result<BetPlaced> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let _guard = self.lock(market_address).await;
        let mut market = self.load_market(&market_address)?;

        let now = self.clock.now();
        let status = market.status(now);
        if status != MarketStatus::Active {
            return Err(LedgerError::MarketNotActive {
                market: market_address,
                status,
            });
        }

        let (bet_address, bump) = self.deriver.bet_address(&market_address, &bettor)?;
        let bet = match self.bets.get(&bet_address).map(|b| b.clone()) {
            Some(existing) => {
                if existing.prediction != prediction {
                    return Err(LedgerError::PredictionMismatch {
                        bet: bet_address,
                        existing: existing.prediction,
                    });
                }
                Bet {
                    amount: existing
                        .amount
                        .checked_add(amount)
                        .ok_or(LedgerError::MathOverflow { context: "bet amount" })?,
                    ..existing
                }
            }
            None => Bet {
                market: market_address,
                bettor,
                amount,
                prediction,
                claimed: false,
                bump,
            },
        };

        let pools = market
            .pools()
            .with_stake(prediction, amount)
            .ok_or(LedgerError::MathOverflow { context: "pool total" })?;
        market.total_yes_amount = pools.yes;
        market.total_no_amount = pools.no;

        let writes = vec![
            (market_address, codec::encode(&market)?),
            (bet_address, codec::encode(&bet)?),
        ];
        let position = Position::from_bet(&bet, &market, now)?;
        self.persist("place_bet", writes).await?;

        self.markets.insert(market_address, market);
        self.bets.insert(bet_address, bet.clone());

        metrics::record_bet(amount);
        info!(
            bet = %bet_address,
            amount,
            side = %prediction,
            total = bet.amount,
            "Bet placed"
        );
        Ok(BetPlaced {
            address: bet_address,
            bet,
            position,
        })
    }

    /// Set the outcome of a market. Only the creator may resolve, exactly
    /// once, and not before the end time unless early resolution is enabled.
    #[instrument(skip(self), fields(market = %market, resolver = %resolver))]
    pub async fn resolve_market(
        &self,
        market: Address,
        resolver: Address,
        outcome: Side,
    ) -> Result<Market> {
        logged(
            "resolve_market",
            self.resolve_market_inner(market, resolver, outcome).await,
        )
    }

    async fn resolve_market_inner(
        &self,
        market_address: Address,
        resolver: Address,
        outcome: Side,
    ) -> Result<Market> {
        let _guard = self.lock(market_address).await;
        let mut market = self.load_market(&market_address)?;
        self.check_resolvable(market_address, &market, resolver)?;

        market.resolved = true;
        market.outcome = Some(outcome);

        let bytes = codec::encode(&market)?;
        self.persist("resolve_market", vec![(market_address, bytes)])
            .await?;
        self.markets.insert(market_address, market.clone());

        metrics::inc_markets_resolved();
        info!(market = %market_address, %outcome, "Market resolved");
        Ok(market)
    }

    /// Resolve a market after checking the asserted outcome against an
    /// oracle assertion. The assertion must be verified, at or above the
    /// configured confidence and carry a binary outcome equal to `outcome`.
    #[instrument(skip(self, oracle), fields(market = %market, event_id = %event_id))]
    pub async fn resolve_with_oracle<O: AccountStore>(
        &self,
        market: Address,
        resolver: Address,
        outcome: Side,
        oracle: &OracleReader<O>,
        event_id: &EventId,
    ) -> Result<Market> {
        let checked = async {
            // Reject callers who could never resolve before touching the oracle.
            let current = self.load_market(&market)?;
            self.check_resolvable(market, &current, resolver)?;

            let assertion = oracle.get_oracle_assertion(event_id).await?;
            if !assertion.verified {
                return Err(LedgerError::OracleUnverified {
                    event_id: event_id.to_string(),
                    reason: "assertion is not verified".to_string(),
                });
            }
            if assertion.confidence < self.options.oracle_min_confidence {
                return Err(LedgerError::OracleUnverified {
                    event_id: event_id.to_string(),
                    reason: format!(
                        "confidence {} is below {}",
                        assertion.confidence, self.options.oracle_min_confidence
                    ),
                });
            }
            let raw = assertion.outcome.ok_or_else(|| LedgerError::OracleUnverified {
                event_id: event_id.to_string(),
                reason: "assertion has no outcome".to_string(),
            })?;
            let oracle_side = assertion.side().ok_or(LedgerError::InvalidOutcome {
                value: i32::try_from(raw).unwrap_or(i32::MAX),
            })?;
            if oracle_side != outcome {
                return Err(LedgerError::OutcomeMismatch {
                    asserted: outcome,
                    oracle: oracle_side,
                });
            }
            Ok(())
        };
        logged("resolve_with_oracle", checked.await)?;

        self.resolve_market(market, resolver, outcome).await
    }

    /// Mark a winning bet as claimed and return its payout. The transfer
    /// itself is left to the caller.
    #[instrument(skip(self), fields(market = %market, bettor = %bettor))]
    pub async fn claim_winnings(&self, market: Address, bettor: Address) -> Result<u64> {
        logged("claim_winnings", self.claim_inner(market, bettor).await)
    }

    async fn claim_inner(&self, market_address: Address, bettor: Address) -> Result<u64> {
        let _guard = self.lock(market_address).await;
        let market = self.load_market(&market_address)?;
        let outcome = match market.outcome {
            Some(outcome) if market.resolved => outcome,
            _ => {
                return Err(LedgerError::MarketNotResolved {
                    market: market_address,
                })
            }
        };

        let (bet_address, _) = self.deriver.bet_address(&market_address, &bettor)?;
        let mut bet = self.load_bet(&bet_address)?;
        if bet.claimed {
            return Err(LedgerError::BetAlreadyClaimed { bet: bet_address });
        }
        if !bet.wins(outcome) {
            return Err(LedgerError::LosingBet { bet: bet_address });
        }

        let payout = pricing::payout(bet.amount, bet.prediction, market.pools())?;
        bet.claimed = true;

        let bytes = codec::encode(&bet)?;
        self.persist("claim_winnings", vec![(bet_address, bytes)])
            .await?;
        self.bets.insert(bet_address, bet);

        metrics::record_claim(payout);
        info!(bet = %bet_address, payout, "Winnings claimed");
        Ok(payout)
    }

    /// Reload every market and bet account from the store, replacing the
    /// in-memory state. Each record's bump must re-derive its address.
    ///
    /// Waits for in-flight mutations and holds new ones back until the
    /// reload is done.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<usize> {
        let _exclusive = self.hydration.write().await;
        let timeout = self.options.rpc_timeout;
        let market_prefix = AccountKind::Market.discriminator();
        let bet_prefix = AccountKind::Bet.discriminator();
        let (raw_markets, raw_bets) = futures::try_join!(
            with_timeout(timeout, self.store.scan(&market_prefix)),
            with_timeout(timeout, self.store.scan(&bet_prefix)),
        )
        .map_err(|e| unavailable("hydrate", e))?;

        let mut markets = Vec::with_capacity(raw_markets.len());
        for (address, bytes) in raw_markets {
            let market: Market = codec::decode(&bytes)?;
            let expected = self.deriver.create_address(
                namespace::MARKET,
                &[market.creator.as_ref(), question_seed(&market.question)],
                market.bump,
            )?;
            check_address(address, expected)?;
            markets.push((address, market));
        }

        let mut bets = Vec::with_capacity(raw_bets.len());
        for (address, bytes) in raw_bets {
            let bet: Bet = codec::decode(&bytes)?;
            let expected = self.deriver.create_address(
                namespace::BET,
                &[bet.market.as_ref(), bet.bettor.as_ref()],
                bet.bump,
            )?;
            check_address(address, expected)?;
            bets.push((address, bet));
        }

        let count = markets.len() + bets.len();
        self.markets.clear();
        self.bets.clear();
        for (address, market) in markets {
            self.markets.insert(address, market);
        }
        for (address, bet) in bets {
            self.bets.insert(address, bet);
        }

        info!(
            markets = self.markets.len(),
            bets = self.bets.len(),
            "Ledger hydrated"
        );
        Ok(count)
    }

    // === Queries ===

    /// Stored market record.
    pub fn market(&self, address: &Address) -> Option<Market> {
        self.markets.get(address).map(|m| m.clone())
    }

    /// Market with derived pricing.
    pub fn market_view(&self, address: &Address) -> Result<MarketView> {
        let market = self.load_market(address)?;
        Ok(MarketView::new(*address, market, self.clock.now()))
    }

    /// Every market, latest end time first.
    pub fn list_markets(&self) -> Vec<MarketView> {
        let now = self.clock.now();
        let mut views: Vec<MarketView> = self
            .markets
            .iter()
            .map(|entry| MarketView::new(*entry.key(), entry.value().clone(), now))
            .collect();
        views.sort_by(|a, b| {
            b.market
                .end_time
                .cmp(&a.market.end_time)
                .then_with(|| a.address.cmp(&b.address))
        });
        views
    }

    /// Bet of `bettor` in `market`, if any.
    pub fn bet(&self, market: &Address, bettor: &Address) -> Result<Option<Bet>> {
        let (address, _) = self.deriver.bet_address(market, bettor)?;
        Ok(self.bets.get(&address).map(|b| b.clone()))
    }

    /// Position of `bettor` in `market`.
    pub fn position(&self, market: &Address, bettor: &Address) -> Result<Position> {
        let (bet_address, _) = self.deriver.bet_address(market, bettor)?;
        let bet = self.load_bet(&bet_address)?;
        let market = self.load_market(market)?;
        Position::from_bet(&bet, &market, self.clock.now())
    }

    /// Every position held by `bettor`.
    pub fn positions_for(&self, bettor: &Address) -> Result<Vec<Position>> {
        let now = self.clock.now();
        let bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|entry| entry.value().bettor == *bettor)
            .map(|entry| entry.value().clone())
            .collect();

        let mut positions = Vec::with_capacity(bets.len());
        for bet in bets {
            let market = self.load_market(&bet.market)?;
            positions.push(Position::from_bet(&bet, &market, now)?);
        }
        positions.sort_by(|a, b| a.market.cmp(&b.market));
        Ok(positions)
    }

    /// Settlement totals for a resolved market.
    pub fn settlement(&self, address: &Address) -> Result<Settlement> {
        let market = self.load_market(address)?;
        let outcome = market
            .outcome
            .ok_or(LedgerError::MarketNotResolved { market: *address })?;
        let stakes: Vec<(u64, Side)> = self
            .bets
            .iter()
            .filter(|entry| entry.value().market == *address)
            .map(|entry| (entry.value().amount, entry.value().prediction))
            .collect();
        pricing::settle(market.pools(), outcome, stakes)
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> LedgerStats {
        let now = self.clock.now();
        let mut stats = LedgerStats::default();

        for entry in self.markets.iter() {
            let market = entry.value();
            stats.total_markets += 1;
            stats.total_volume += market.pools().total();
            match market.status(now) {
                MarketStatus::Active => stats.active_markets += 1,
                MarketStatus::Ended => stats.ended_markets += 1,
                MarketStatus::Resolved => stats.resolved_markets += 1,
            }
        }

        let mut bettors = HashSet::new();
        for entry in self.bets.iter() {
            stats.total_bets += 1;
            bettors.insert(entry.value().bettor);
        }
        stats.unique_bettors = bettors.len();
        stats
    }

    // === Internals ===

    async fn lock(&self, market: Address) -> MarketGuard<'_> {
        let hydration = self.hydration.read().await;
        let lock = self.locks.entry(market).or_default().clone();
        MarketGuard {
            _hydration: hydration,
            _market: lock.lock_owned().await,
        }
    }

    fn load_market(&self, address: &Address) -> Result<Market> {
        self.market(address).ok_or(LedgerError::NotFound {
            kind: "market",
            address: *address,
        })
    }

    fn load_bet(&self, address: &Address) -> Result<Bet> {
        self.bets
            .get(address)
            .map(|b| b.clone())
            .ok_or(LedgerError::NotFound {
                kind: "bet",
                address: *address,
            })
    }

    fn check_resolvable(&self, address: Address, market: &Market, resolver: Address) -> Result<()> {
        if resolver != market.creator {
            return Err(LedgerError::UnauthorizedResolver {
                market: address,
                resolver,
            });
        }
        if market.resolved {
            return Err(LedgerError::MarketAlreadyResolved { market: address });
        }
        let status = market.status(self.clock.now());
        if status == MarketStatus::Active && !self.options.allow_early_resolution {
            return Err(LedgerError::MarketNotActive {
                market: address,
                status,
            });
        }
        Ok(())
    }

    async fn persist(&self, operation: &'static str, writes: Vec<(Address, Vec<u8>)>) -> Result<()> {
        let _timer = metrics::timer_store_commit();
        with_timeout(self.options.rpc_timeout, self.store.commit(writes))
            .await
            .map_err(|e| unavailable(operation, e))
    }
}

fn validate_text(question: &str, description: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(LedgerError::InvalidText {
            field: "question",
            reason: "must not be empty".to_string(),
        });
    }
    if question.len() > MAX_QUESTION_LEN {
        return Err(LedgerError::InvalidText {
            field: "question",
            reason: format!("{} bytes exceeds {MAX_QUESTION_LEN}", question.len()),
        });
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(LedgerError::InvalidText {
            field: "description",
            reason: format!("{} bytes exceeds {MAX_DESCRIPTION_LEN}", description.len()),
        });
    }
    Ok(())
}

fn check_address(stored: Address, derived: Address) -> Result<()> {
    if stored == derived {
        Ok(())
    } else {
        Err(CodecError::InvalidValue {
            field: "bump",
            reason: "does not derive the stored address",
        }
        .into())
    }
}

fn unavailable(operation: &'static str, err: crate::error::StoreError) -> LedgerError {
    metrics::inc_ledger_unavailable(operation);
    warn!(operation, error = %err, "Store call failed; state unchanged");
    err.into()
}

fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        match e.class() {
            // already logged at the store boundary
            ErrorClass::Transient => {}
            ErrorClass::Codec => warn!(operation, code = e.code(), error = %e, "Rejected"),
            _ => debug!(operation, code = e.code(), error = %e, "Rejected"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{InMemoryAccountStore, StoreConfig};
    use crate::oracle::{OracleAssertion, OracleOptions};
    use crate::utils::ManualClock;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        store: Arc<InMemoryAccountStore>,
        clock: Arc<ManualClock>,
        ledger: MarketLedger<InMemoryAccountStore>,
    }

    fn fixture_with(options: LedgerOptions) -> Fixture {
        let store = Arc::new(InMemoryAccountStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let ledger = MarketLedger::with_clock(
            store.clone(),
            AddressDeriver::new(Address::new([0xAA; 32])),
            options,
            clock.clone(),
        );
        Fixture {
            store,
            clock,
            ledger,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(LedgerOptions::default())
    }

    fn creator() -> Address {
        Address::new([1; 32])
    }

    fn user(n: u8) -> Address {
        Address::new([0x10 + n; 32])
    }

    fn new_market(question: &str) -> NewMarket {
        NewMarket {
            creator: creator(),
            question: question.to_string(),
            description: "test market".to_string(),
            end_time: NOW + 1_000,
            resolution_time: NOW + 2_000,
            metadata: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_market_starts_with_empty_pools() {
        let f = fixture();
        let (address, market) = f.ledger.create_market(new_market("Rain?")).await.unwrap();

        assert_eq!(market.total_yes_amount, 0);
        assert_eq!(market.total_no_amount, 0);
        assert!(!market.resolved);
        assert_eq!(f.ledger.market(&address), Some(market.clone()));

        let (derived, bump) = f.ledger.deriver().market_address(&creator(), "Rain?").unwrap();
        assert_eq!((derived, bump), (address, market.bump));

        let stored = f.store.get_account(&address).await.unwrap().unwrap();
        assert_eq!(codec::decode::<Market>(&stored).unwrap(), market);
    }

    #[tokio::test]
    async fn create_market_validates_schedule_and_text() {
        let f = fixture();

        let mut past = new_market("Past?");
        past.end_time = NOW;
        assert!(matches!(
            f.ledger.create_market(past).await,
            Err(LedgerError::InvalidSchedule { .. })
        ));

        let mut backwards = new_market("Backwards?");
        backwards.resolution_time = backwards.end_time - 1;
        assert!(matches!(
            f.ledger.create_market(backwards).await,
            Err(LedgerError::InvalidSchedule { .. })
        ));

        let long = new_market(&"x".repeat(MAX_QUESTION_LEN + 1));
        assert!(matches!(
            f.ledger.create_market(long).await,
            Err(LedgerError::InvalidText { field: "question", .. })
        ));

        let mut wordy = new_market("Wordy?");
        wordy.description = "d".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            f.ledger.create_market(wordy).await,
            Err(LedgerError::InvalidText { field: "description", .. })
        ));

        assert!(matches!(
            f.ledger.create_market(new_market("  ")).await,
            Err(LedgerError::InvalidText { field: "question", .. })
        ));
        assert_eq!(f.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_market_is_rejected() {
        let f = fixture();
        f.ledger.create_market(new_market("Same?")).await.unwrap();
        let err = f.ledger.create_market(new_market("Same?")).await.unwrap_err();
        assert_eq!(err.code(), "MarketExists");
    }

    #[tokio::test]
    async fn first_bet_on_one_side_keeps_unit_odds() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("A?")).await.unwrap();

        let placed = f
            .ledger
            .place_bet(market, user(1), 100, Side::Yes)
            .await
            .unwrap();

        let view = f.ledger.market_view(&market).unwrap();
        assert_eq!(view.market.total_yes_amount, 100);
        assert_eq!(view.odds.yes, dec!(1));
        assert_eq!(view.probability_bps, ProbabilityBps { yes: 10_000, no: 0 });
        assert_eq!(placed.bet.amount, 100);
        assert_eq!(placed.position.current_value, 100);
    }

    #[tokio::test]
    async fn repeat_bet_tops_up_same_side_only() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Top up?")).await.unwrap();

        f.ledger.place_bet(market, user(1), 40, Side::No).await.unwrap();
        let placed = f.ledger.place_bet(market, user(1), 60, Side::No).await.unwrap();
        assert_eq!(placed.bet.amount, 100);

        let err = f
            .ledger
            .place_bet(market, user(1), 5, Side::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PredictionMismatch { existing: Side::No, .. }));

        let market = f.ledger.market(&market).unwrap();
        assert_eq!(market.total_no_amount, 100);
        assert_eq!(market.total_yes_amount, 0);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Zero?")).await.unwrap();
        let err = f.ledger.place_bet(market, user(1), 0, Side::Yes).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { amount: 0 }));
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[tokio::test]
    async fn bet_after_end_time_is_rejected() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Late?")).await.unwrap();
        f.clock.advance(1_000);

        let err = f.ledger.place_bet(market, user(1), 10, Side::Yes).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MarketNotActive {
                status: MarketStatus::Ended,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bet_on_unknown_market_is_not_found() {
        let f = fixture();
        let err = f
            .ledger
            .place_bet(Address::new([0x77; 32]), user(1), 10, Side::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { kind: "market", .. }));
    }

    #[tokio::test]
    async fn only_creator_resolves_and_only_once() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Who?")).await.unwrap();
        f.clock.advance(1_000);

        let err = f
            .ledger
            .resolve_market(market, user(9), Side::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedResolver { .. }));
        assert!(!f.ledger.market(&market).unwrap().resolved);

        f.ledger.resolve_market(market, creator(), Side::Yes).await.unwrap();
        let err = f
            .ledger
            .resolve_market(market, creator(), Side::No)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MarketAlreadyResolved { .. }));
        assert_eq!(f.ledger.market(&market).unwrap().outcome, Some(Side::Yes));
    }

    #[tokio::test]
    async fn early_resolution_follows_policy() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Early?")).await.unwrap();
        let err = f
            .ledger
            .resolve_market(market, creator(), Side::Yes)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MarketNotActive {
                status: MarketStatus::Active,
                ..
            }
        ));

        let f = fixture_with(LedgerOptions {
            allow_early_resolution: true,
            ..LedgerOptions::default()
        });
        let (market, _) = f.ledger.create_market(new_market("Early?")).await.unwrap();
        let resolved = f
            .ledger
            .resolve_market(market, creator(), Side::No)
            .await
            .unwrap();
        assert_eq!(resolved.outcome, Some(Side::No));

        let err = f.ledger.place_bet(market, user(1), 5, Side::No).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MarketNotActive {
                status: MarketStatus::Resolved,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn claim_pays_winner_once() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Claim?")).await.unwrap();
        f.ledger.place_bet(market, user(1), 300, Side::Yes).await.unwrap();
        f.ledger.place_bet(market, user(2), 50, Side::No).await.unwrap();
        f.ledger.place_bet(market, user(3), 50, Side::No).await.unwrap();

        let err = f.ledger.claim_winnings(market, user(2)).await.unwrap_err();
        assert!(matches!(err, LedgerError::MarketNotResolved { .. }));

        f.clock.advance(1_000);
        f.ledger.resolve_market(market, creator(), Side::No).await.unwrap();

        assert_eq!(f.ledger.claim_winnings(market, user(2)).await.unwrap(), 200);
        assert!(matches!(
            f.ledger.claim_winnings(market, user(2)).await,
            Err(LedgerError::BetAlreadyClaimed { .. })
        ));
        assert!(matches!(
            f.ledger.claim_winnings(market, user(1)).await,
            Err(LedgerError::LosingBet { .. })
        ));
        assert!(matches!(
            f.ledger.claim_winnings(market, user(7)).await,
            Err(LedgerError::NotFound { kind: "bet", .. })
        ));

        let settlement = f.ledger.settlement(&market).unwrap();
        assert_eq!(settlement.total_paid, 400);
        assert_eq!(settlement.retained, 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_unchanged() {
        let f = fixture();
        let (market, before) = f.ledger.create_market(new_market("Flaky?")).await.unwrap();

        f.store.set_fail_writes(true);
        let err = f.ledger.place_bet(market, user(1), 10, Side::Yes).await.unwrap_err();
        assert!(matches!(err, LedgerError::LedgerUnavailable { .. }));
        assert!(err.is_retryable());

        assert_eq!(f.ledger.market(&market), Some(before));
        assert_eq!(f.ledger.bet(&market, &user(1)).unwrap(), None);

        f.store.set_fail_writes(false);
        f.ledger.place_bet(market, user(1), 10, Side::Yes).await.unwrap();
        assert_eq!(f.ledger.market(&market).unwrap().total_yes_amount, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn store_timeout_is_ledger_unavailable() {
        let f = fixture_with(LedgerOptions {
            rpc_timeout: Duration::from_millis(100),
            ..LedgerOptions::default()
        });
        let (market, before) = f.ledger.create_market(new_market("Slow?")).await.unwrap();

        f.store.set_latency_ms(5_000);
        let err = f.ledger.place_bet(market, user(1), 10, Side::Yes).await.unwrap_err();
        assert!(matches!(err, LedgerError::LedgerUnavailable { .. }));
        assert_eq!(f.ledger.market(&market), Some(before));
        assert_eq!(f.store.commit_count(), 1);
    }

    #[tokio::test]
    async fn positions_and_stats() {
        let f = fixture();
        let (a, _) = f.ledger.create_market(new_market("A?")).await.unwrap();
        let (b, _) = f.ledger.create_market(new_market("B?")).await.unwrap();
        f.ledger.place_bet(a, user(1), 300, Side::Yes).await.unwrap();
        f.ledger.place_bet(a, user(2), 100, Side::No).await.unwrap();
        f.ledger.place_bet(b, user(1), 25, Side::No).await.unwrap();

        let positions = f.ledger.positions_for(&user(1)).unwrap();
        assert_eq!(positions.len(), 2);

        let position = f.ledger.position(&a, &user(2)).unwrap();
        assert_eq!(position.current_value, 400);
        assert_eq!(position.unrealized_pnl, 300);

        let stats = f.ledger.stats();
        assert_eq!(
            stats,
            LedgerStats {
                total_markets: 2,
                active_markets: 2,
                ended_markets: 0,
                resolved_markets: 0,
                total_bets: 3,
                unique_bettors: 2,
                total_volume: 425,
            }
        );
        assert_eq!(f.ledger.list_markets().len(), 2);
    }

    #[tokio::test]
    async fn hydrate_restores_state_from_store() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Persist?")).await.unwrap();
        f.ledger.place_bet(market, user(1), 70, Side::Yes).await.unwrap();

        let restored = MarketLedger::with_clock(
            f.store.clone(),
            f.ledger.deriver().clone(),
            LedgerOptions::default(),
            f.clock.clone(),
        );
        assert_eq!(restored.hydrate().await.unwrap(), 2);
        assert_eq!(restored.market(&market), f.ledger.market(&market));
        assert_eq!(restored.bet(&market, &user(1)).unwrap().unwrap().amount, 70);
    }

    #[tokio::test]
    async fn hydrate_rejects_misplaced_account() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Moved?")).await.unwrap();
        let bytes = f.store.get_account(&market).await.unwrap().unwrap();
        f.store.insert_raw(Address::new([0x42; 32]), bytes).await;

        let err = f.ledger.hydrate().await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Codec);
    }

    async fn publish_assertion(
        store: &InMemoryAccountStore,
        oracle: &OracleReader<InMemoryAccountStore>,
        assertion: &OracleAssertion,
    ) {
        let address = oracle.oracle_address(&assertion.event_id).unwrap();
        store
            .insert_raw(address, codec::encode(assertion).unwrap())
            .await;
    }

    #[tokio::test]
    async fn oracle_checked_resolution() {
        let f = fixture();
        let oracle = OracleReader::new(
            f.store.clone(),
            f.ledger.deriver().clone(),
            OracleOptions::default(),
        );
        let event_id = EventId::new("rain-2025").unwrap();
        let mut assertion = OracleAssertion {
            event_id: event_id.clone(),
            outcome: Some(1),
            confidence: 0.3,
            timestamp: NOW,
            source: "met office".to_string(),
            verified: true,
        };
        publish_assertion(&f.store, &oracle, &assertion).await;

        let (market, _) = f.ledger.create_market(new_market("Rain?")).await.unwrap();
        f.clock.advance(1_000);

        let err = f
            .ledger
            .resolve_with_oracle(market, user(5), Side::Yes, &oracle, &event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedResolver { .. }));

        let err = f
            .ledger
            .resolve_with_oracle(market, creator(), Side::Yes, &oracle, &event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::OracleUnverified { .. }));

        assertion.confidence = 0.9;
        publish_assertion(&f.store, &oracle, &assertion).await;
        oracle.clear_cache();

        let err = f
            .ledger
            .resolve_with_oracle(market, creator(), Side::No, &oracle, &event_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OutcomeMismatch {
                asserted: Side::No,
                oracle: Side::Yes
            }
        ));

        let resolved = f
            .ledger
            .resolve_with_oracle(market, creator(), Side::Yes, &oracle, &event_id)
            .await
            .unwrap();
        assert_eq!(resolved.outcome, Some(Side::Yes));
    }

    #[tokio::test]
    async fn non_binary_oracle_outcome_is_rejected() {
        let f = fixture();
        let oracle = OracleReader::new(
            f.store.clone(),
            f.ledger.deriver().clone(),
            OracleOptions::default(),
        );
        let event_id = EventId::new("tri-state").unwrap();
        publish_assertion(
            &f.store,
            &oracle,
            &OracleAssertion {
                event_id: event_id.clone(),
                outcome: Some(2),
                confidence: 1.0,
                timestamp: NOW,
                source: String::new(),
                verified: true,
            },
        )
        .await;

        let (market, _) = f.ledger.create_market(new_market("Tri?")).await.unwrap();
        f.clock.advance(1_000);
        let err = f
            .ledger
            .resolve_with_oracle(market, creator(), Side::Yes, &oracle, &event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOutcome { value: 2 }));
        assert!(!f.ledger.market(&market).unwrap().resolved);
    }

    #[tokio::test]
    async fn failing_reads_block_create_and_hydrate() {
        let store = Arc::new(InMemoryAccountStore::with_config(StoreConfig {
            fail_reads: true,
            ..StoreConfig::default()
        }));
        let ledger = MarketLedger::with_clock(
            store.clone(),
            AddressDeriver::new(Address::new([0xAA; 32])),
            LedgerOptions::default(),
            Arc::new(ManualClock::new(NOW)),
        );
        assert!(matches!(
            ledger.hydrate().await,
            Err(LedgerError::LedgerUnavailable { .. })
        ));
        assert!(matches!(
            ledger.create_market(new_market("Still works?")).await,
            Err(LedgerError::LedgerUnavailable { .. })
        ));
        assert_eq!(ledger.stats().total_markets, 0);
        assert_eq!(store.commit_count(), 0);

        store.set_fail_reads(false);
        ledger.create_market(new_market("Still works?")).await.unwrap();
        assert_eq!(ledger.stats().total_markets, 1);
    }

    #[tokio::test]
    async fn create_market_respects_accounts_already_in_store() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Shared?")).await.unwrap();
        f.ledger.place_bet(market, user(1), 70, Side::Yes).await.unwrap();
        let commits = f.store.commit_count();

        // A second ledger on the same store that has not hydrated yet.
        let fresh = MarketLedger::with_clock(
            f.store.clone(),
            f.ledger.deriver().clone(),
            LedgerOptions::default(),
            f.clock.clone(),
        );
        let err = fresh.create_market(new_market("Shared?")).await.unwrap_err();
        assert!(matches!(err, LedgerError::MarketExists { market: m } if m == market));
        assert_eq!(f.store.commit_count(), commits);
        assert_eq!(fresh.market(&market), None);

        let stored = f.store.get_account(&market).await.unwrap().unwrap();
        let stored = codec::decode::<Market>(&stored).unwrap();
        assert_eq!(stored.total_yes_amount, 70);
        assert_eq!(Some(stored), f.ledger.market(&market));
    }

    #[tokio::test]
    async fn pool_total_overflow_is_rejected_before_commit() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Whale?")).await.unwrap();
        f.ledger
            .place_bet(market, user(1), u64::MAX, Side::Yes)
            .await
            .unwrap();
        let commits = f.store.commit_count();

        let err = f.ledger.place_bet(market, user(2), 1, Side::No).await.unwrap_err();
        assert!(matches!(err, LedgerError::MathOverflow { .. }));
        assert_eq!(f.store.commit_count(), commits);
        assert_eq!(f.ledger.bet(&market, &user(2)).unwrap(), None);
        let (bet_address, _) = f.ledger.deriver().bet_address(&market, &user(2)).unwrap();
        assert_eq!(f.store.get_account(&bet_address).await.unwrap(), None);

        let stored = f.store.get_account(&market).await.unwrap().unwrap();
        let stored = codec::decode::<Market>(&stored).unwrap();
        assert_eq!(Some(stored), f.ledger.market(&market));

        f.clock.advance(1_000);
        f.ledger.resolve_market(market, creator(), Side::Yes).await.unwrap();
        assert_eq!(f.ledger.claim_winnings(market, user(1)).await.unwrap(), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn hydrate_waits_for_concurrent_bets() {
        let f = fixture();
        let (market, _) = f.ledger.create_market(new_market("Race?")).await.unwrap();
        f.store.set_latency_ms(200);

        let (hydrated, placed) = tokio::join!(
            f.ledger.hydrate(),
            f.ledger.place_bet(market, user(1), 40, Side::No)
        );
        assert_eq!(hydrated.unwrap(), 1);
        placed.unwrap();

        let stored = f.store.get_account(&market).await.unwrap().unwrap();
        let stored = codec::decode::<Market>(&stored).unwrap();
        assert_eq!(stored.total_no_amount, 40);
        assert_eq!(Some(stored), f.ledger.market(&market));
        assert_eq!(f.ledger.bet(&market, &user(1)).unwrap().unwrap().amount, 40);
    }
}
