//! End-to-end tests for the ledger, codec and oracle reader.
//!
//! Everything runs against the in-memory account store; no network access
//! is required.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use parimutuel_ledger::address::{Address, AddressDeriver};
use parimutuel_ledger::codec::{self, Account, AccountKind};
use parimutuel_ledger::error::{CodecError, ErrorClass, LedgerError};
use parimutuel_ledger::market::{
    InMemoryAccountStore, LedgerOptions, Market, MarketLedger, MarketStatus, NewMarket, Side,
};
use parimutuel_ledger::oracle::{EventAccount, EventId, OracleOptions, OracleReader};
use parimutuel_ledger::utils::ManualClock;

const NOW: i64 = 1_750_000_000;

struct Harness {
    store: Arc<InMemoryAccountStore>,
    clock: Arc<ManualClock>,
    ledger: Arc<MarketLedger<InMemoryAccountStore>>,
    oracle: OracleReader<InMemoryAccountStore>,
}

fn harness() -> Harness {
    harness_with(LedgerOptions::default())
}

fn harness_with(options: LedgerOptions) -> Harness {
    let store = Arc::new(InMemoryAccountStore::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let deriver = AddressDeriver::new(Address::new([0x5A; 32]));
    let ledger = Arc::new(MarketLedger::with_clock(
        store.clone(),
        deriver.clone(),
        options,
        clock.clone(),
    ));
    let oracle = OracleReader::new(store.clone(), deriver, OracleOptions::default());
    Harness {
        store,
        clock,
        ledger,
        oracle,
    }
}

fn creator() -> Address {
    Address::new([0xC0; 32])
}

fn bettor(n: u8) -> Address {
    Address::new([n; 32])
}

fn market_params(question: &str) -> NewMarket {
    NewMarket {
        creator: creator(),
        question: question.to_string(),
        description: String::new(),
        end_time: NOW + 1_000,
        resolution_time: NOW + 1_000,
        metadata: Vec::new(),
    }
}

async fn open_market(h: &Harness, question: &str) -> Address {
    h.ledger.create_market(market_params(question)).await.unwrap().0
}

// === Scenarios ===

#[tokio::test]
async fn single_sided_market_has_unit_odds() {
    let h = harness();
    let market = open_market(&h, "Will it snow?").await;

    assert_ok!(h.ledger.place_bet(market, bettor(1), 100, Side::Yes).await);

    let view = h.ledger.market_view(&market).unwrap();
    assert_eq!(view.market.total_yes_amount, 100);
    assert_eq!(view.odds.yes.to_string(), "1");
    assert_eq!(view.status, MarketStatus::Active);
}

#[tokio::test]
async fn underdog_winner_takes_proportional_share() {
    let h = harness();
    let market = open_market(&h, "Underdog?").await;

    h.ledger.place_bet(market, bettor(1), 200, Side::Yes).await.unwrap();
    h.ledger.place_bet(market, bettor(2), 100, Side::Yes).await.unwrap();
    h.ledger.place_bet(market, bettor(3), 50, Side::No).await.unwrap();
    h.ledger.place_bet(market, bettor(4), 50, Side::No).await.unwrap();

    h.clock.advance(1_000);
    h.ledger
        .resolve_market(market, creator(), Side::No)
        .await
        .unwrap();

    assert_eq!(h.ledger.claim_winnings(market, bettor(3)).await.unwrap(), 200);
    assert_eq!(h.ledger.claim_winnings(market, bettor(4)).await.unwrap(), 200);

    let stored = h.ledger.market(&market).unwrap();
    assert_eq!((stored.total_yes_amount, stored.total_no_amount), (300, 100));
}

#[tokio::test]
async fn betting_closes_at_end_time() {
    let h = harness();
    let market = open_market(&h, "Closed?").await;
    h.clock.set(NOW + 1_000);

    let err = h
        .ledger
        .place_bet(market, bettor(1), 10, Side::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MarketNotActive { .. }));
    assert_eq!(err.class(), ErrorClass::StateConflict);
}

#[tokio::test]
async fn stranger_cannot_resolve() {
    let h = harness();
    let market = open_market(&h, "Mine?").await;
    h.clock.advance(2_000);

    let err = h
        .ledger
        .resolve_market(market, bettor(9), Side::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnauthorizedResolver { .. }));
    assert!(!h.ledger.market(&market).unwrap().resolved);
}

#[test]
fn truncated_account_is_malformed() {
    let err = codec::decode::<Market>(&AccountKind::Market.discriminator()).unwrap_err();
    assert!(matches!(err, CodecError::BufferTooShort { .. }));

    let err = LedgerError::from(err);
    assert_eq!(err.code(), "MalformedAccount");
    assert_eq!(err.class(), ErrorClass::Codec);
    assert!(!err.is_retryable());
}

// === Settlement properties ===

#[tokio::test]
async fn claim_succeeds_once() {
    let h = harness();
    let market = open_market(&h, "Once?").await;
    h.ledger.place_bet(market, bettor(1), 10, Side::Yes).await.unwrap();
    h.clock.advance(1_000);
    h.ledger.resolve_market(market, creator(), Side::Yes).await.unwrap();

    assert_ok!(h.ledger.claim_winnings(market, bettor(1)).await);
    let err = assert_err!(h.ledger.claim_winnings(market, bettor(1)).await);
    assert!(matches!(err, LedgerError::BetAlreadyClaimed { .. }));
}

#[tokio::test]
async fn payouts_conserve_the_pool() {
    let h = harness();
    let market = open_market(&h, "Conserved?").await;

    let winners: Vec<(u8, u64)> = vec![(1, 7), (2, 13), (3, 29), (4, 1)];
    let losers: Vec<(u8, u64)> = vec![(10, 17), (11, 23)];
    for (n, amount) in &winners {
        h.ledger.place_bet(market, bettor(*n), *amount, Side::Yes).await.unwrap();
    }
    for (n, amount) in &losers {
        h.ledger.place_bet(market, bettor(*n), *amount, Side::No).await.unwrap();
    }

    h.clock.advance(1_000);
    h.ledger.resolve_market(market, creator(), Side::Yes).await.unwrap();

    let mut paid: u128 = 0;
    for (n, _) in &winners {
        paid += u128::from(h.ledger.claim_winnings(market, bettor(*n)).await.unwrap());
    }
    for (n, _) in &losers {
        assert!(matches!(
            h.ledger.claim_winnings(market, bettor(*n)).await,
            Err(LedgerError::LosingBet { .. })
        ));
    }

    let total: u128 = 7 + 13 + 29 + 1 + 17 + 23;
    assert!(paid <= total);
    assert!(total - paid < winners.len() as u128);

    let settlement = h.ledger.settlement(&market).unwrap();
    assert_eq!(settlement.total_paid, paid);
    assert_eq!(settlement.winners, winners.len());
}

// === Concurrency and failure ===

#[tokio::test]
async fn concurrent_bets_on_one_market_all_land() {
    let h = harness();
    let market = open_market(&h, "Busy?").await;

    let bets = (1..=20u8).map(|n| {
        let ledger = h.ledger.clone();
        let side = if n % 2 == 0 { Side::Yes } else { Side::No };
        async move { ledger.place_bet(market, bettor(n), u64::from(n), side).await }
    });
    for result in join_all(bets).await {
        assert_ok!(result);
    }

    let stored = h.ledger.market(&market).unwrap();
    let yes: u64 = (1..=20u64).filter(|n| n % 2 == 0).sum();
    let no: u64 = (1..=20u64).filter(|n| n % 2 == 1).sum();
    assert_eq!((stored.total_yes_amount, stored.total_no_amount), (yes, no));
    assert_eq!(h.ledger.stats().total_bets, 20);
}

#[tokio::test(start_paused = true)]
async fn same_market_serializes_but_different_markets_do_not() {
    let h = harness();
    let a = open_market(&h, "A?").await;
    let b = open_market(&h, "B?").await;
    h.store.set_latency_ms(200);

    let started = Instant::now();
    let (first, second) = tokio::join!(
        h.ledger.place_bet(a, bettor(1), 10, Side::Yes),
        h.ledger.place_bet(b, bettor(2), 10, Side::Yes),
    );
    assert_ok!(first);
    assert_ok!(second);
    assert!(started.elapsed() < Duration::from_millis(400));

    let started = Instant::now();
    let (first, second) = tokio::join!(
        h.ledger.place_bet(a, bettor(3), 10, Side::Yes),
        h.ledger.place_bet(a, bettor(4), 10, Side::No),
    );
    assert_ok!(first);
    assert_ok!(second);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn cancelled_bet_leaves_no_trace() {
    let h = harness();
    let market = open_market(&h, "Cancelled?").await;
    let before = h.ledger.market(&market);
    h.store.set_latency_ms(500);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        h.ledger.place_bet(market, bettor(1), 10, Side::Yes),
    )
    .await;
    assert!(cancelled.is_err());

    assert_eq!(h.ledger.market(&market), before);
    assert_eq!(h.ledger.bet(&market, &bettor(1)).unwrap(), None);
    assert_eq!(h.store.len().await, 1);

    // the market lock was released with the dropped future
    assert_ok!(h.ledger.place_bet(market, bettor(1), 10, Side::Yes).await);
}

#[tokio::test(start_paused = true)]
async fn store_timeout_surfaces_as_unavailable() {
    let h = harness_with(LedgerOptions {
        rpc_timeout: Duration::from_millis(50),
        ..LedgerOptions::default()
    });
    let market = open_market(&h, "Timeout?").await;
    h.clock.advance(1_000);
    h.store.set_latency_ms(1_000);

    let err = h
        .ledger
        .resolve_market(market, creator(), Side::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LedgerUnavailable { .. }));
    assert!(err.is_retryable());
    assert!(!h.ledger.market(&market).unwrap().resolved);

    h.store.set_latency_ms(0);
    assert_ok!(h.ledger.resolve_market(market, creator(), Side::Yes).await);
}

#[tokio::test]
async fn failed_write_is_retryable_without_side_effects() {
    let h = harness();
    let market = open_market(&h, "Retry?").await;
    h.ledger.place_bet(market, bettor(1), 10, Side::Yes).await.unwrap();
    h.clock.advance(1_000);
    h.ledger.resolve_market(market, creator(), Side::Yes).await.unwrap();

    h.store.set_fail_writes(true);
    let err = h.ledger.claim_winnings(market, bettor(1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::LedgerUnavailable { .. }));
    assert!(!h.ledger.bet(&market, &bettor(1)).unwrap().unwrap().claimed);

    h.store.set_fail_writes(false);
    assert_eq!(h.ledger.claim_winnings(market, bettor(1)).await.unwrap(), 10);
}

// === Persistence and oracle ===

#[tokio::test]
async fn stored_accounts_decode_by_discriminator() {
    let h = harness();
    let market = open_market(&h, "Typed?").await;
    let placed = h
        .ledger
        .place_bet(market, bettor(1), 42, Side::No)
        .await
        .unwrap();

    use parimutuel_ledger::market::AccountStore;
    let raw = h.store.get_account(&placed.address).await.unwrap().unwrap();
    match codec::decode_account(&raw).unwrap() {
        Account::Bet(bet) => {
            assert_eq!(bet.amount, 42);
            assert_eq!(bet.prediction, Side::No);
        }
        other => panic!("unexpected account kind {}", other.kind()),
    }
}

#[tokio::test]
async fn restart_rebuilds_ledger_from_store() {
    let h = harness();
    let market = open_market(&h, "Durable?").await;
    h.ledger.place_bet(market, bettor(1), 5, Side::Yes).await.unwrap();
    h.ledger.place_bet(market, bettor(2), 15, Side::No).await.unwrap();

    let restarted = MarketLedger::with_clock(
        h.store.clone(),
        h.ledger.deriver().clone(),
        LedgerOptions::default(),
        h.clock.clone(),
    );
    assert_eq!(restarted.hydrate().await.unwrap(), 3);
    assert_eq!(restarted.stats(), h.ledger.stats());
    assert_eq!(
        restarted.position(&market, &bettor(2)).unwrap(),
        h.ledger.position(&market, &bettor(2)).unwrap()
    );
}

#[tokio::test]
async fn oracle_events_are_listed_latest_first() {
    let h = harness();
    for (id, end_time) in [("early", NOW + 10), ("late", NOW + 500), ("mid", NOW + 100)] {
        let event = EventAccount {
            event_id: EventId::new(id).unwrap(),
            title: id.to_string(),
            description: String::new(),
            category: "weather".to_string(),
            end_time,
            resolved: false,
            outcome: None,
            total_volume: 0,
            participants: 0,
        };
        let address = h.oracle.event_address(&event.event_id).unwrap();
        h.store
            .insert_raw(address, codec::encode(&event).unwrap())
            .await;
    }

    let events = h.oracle.all_events().await.unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["late", "mid", "early"]);

    let fetched = h.oracle.get_event(&EventId::new("mid").unwrap()).await.unwrap();
    assert!(fetched.is_active(NOW));
}
