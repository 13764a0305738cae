//! Binary-outcome pari-mutuel prediction market ledger.
//!
//! Bettors stake on YES or NO; when the market resolves, the whole pool is
//! split among the winning side in proportion to stake:
//!
//! ```text
//! YES pool:  300
//! NO pool:   100
//! ─────────────────
//! Total:     400
//! Outcome NO, 50 staked on NO  ->  50 * 400 / 100 = 200
//! ```
//!
//! # Modules
//!
//! - [`address`]: Deterministic account address derivation
//! - [`codec`]: Binary account layouts
//! - [`pricing`]: Odds, probabilities and payouts
//! - [`market`]: Market ledger, bets, positions and the account store port
//! - [`oracle`]: Cached oracle event and assertion reader
//! - [`api`]: HTTP API
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Clock and process helpers

pub mod address;
pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod oracle;
pub mod pricing;
pub mod utils;

pub use config::Config;
pub use error::{LedgerError, Result};
