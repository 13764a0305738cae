//! Market Ledger.
//!
//! This module handles:
//! - Market and bet records
//! - The account store port and its in-memory implementation
//! - Market lifecycle, betting, resolution and claims
//! - Position tracking

mod ledger;
mod memory;
mod position;
mod store;
mod types;

pub use ledger::{
    BetPlaced, LedgerOptions, LedgerStats, MarketLedger, MarketView, NewMarket, ProbabilityBps,
    MAX_DESCRIPTION_LEN, MAX_QUESTION_LEN,
};
pub use memory::{InMemoryAccountStore, StoreConfig};
pub use position::Position;
pub use store::{with_timeout, AccountListener, AccountStore, SubscriptionId};
pub use types::{Bet, Market, MarketMetadata, MarketStatus, Side};
