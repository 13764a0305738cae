//! Prometheus metrics for the ledger and oracle reader.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, warn};

// === Metric Name Constants ===

/// Store commit latency metric name.
pub const METRIC_STORE_COMMIT_LATENCY: &str = "store_commit_latency_ms";
/// Markets created counter metric name.
pub const METRIC_MARKETS_CREATED: &str = "markets_created_total";
/// Bets placed counter metric name.
pub const METRIC_BETS_PLACED: &str = "bets_placed_total";
/// Staked volume counter metric name.
pub const METRIC_BET_VOLUME: &str = "bet_volume_total";
/// Markets resolved counter metric name.
pub const METRIC_MARKETS_RESOLVED: &str = "markets_resolved_total";
/// Claims paid counter metric name.
pub const METRIC_CLAIMS_PAID: &str = "claims_paid_total";
/// Payout volume counter metric name.
pub const METRIC_PAYOUT_VOLUME: &str = "payout_volume_total";
/// Ledger unavailable counter metric name.
pub const METRIC_LEDGER_UNAVAILABLE: &str = "ledger_unavailable_total";
/// Oracle cache hits counter metric name.
pub const METRIC_ORACLE_CACHE_HITS: &str = "oracle_cache_hits_total";
/// Oracle cache misses counter metric name.
pub const METRIC_ORACLE_CACHE_MISSES: &str = "oracle_cache_misses_total";
/// Dropped subscription notifications counter metric name.
pub const METRIC_SUBSCRIPTION_DECODE_FAILURES: &str = "subscription_decode_failures_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_STORE_COMMIT_LATENCY,
        "Store commit latency in milliseconds"
    );

    describe_counter!(METRIC_MARKETS_CREATED, "Total number of markets created");
    describe_counter!(METRIC_BETS_PLACED, "Total number of bets accepted");
    describe_counter!(METRIC_BET_VOLUME, "Total amount staked");
    describe_counter!(METRIC_MARKETS_RESOLVED, "Total number of markets resolved");
    describe_counter!(METRIC_CLAIMS_PAID, "Total number of winning claims paid");
    describe_counter!(METRIC_PAYOUT_VOLUME, "Total amount paid out");
    describe_counter!(
        METRIC_LEDGER_UNAVAILABLE,
        "Total number of operations failed by the store"
    );
    describe_counter!(METRIC_ORACLE_CACHE_HITS, "Oracle reads served from cache");
    describe_counter!(METRIC_ORACLE_CACHE_MISSES, "Oracle reads that hit the store");
    describe_counter!(
        METRIC_SUBSCRIPTION_DECODE_FAILURES,
        "Subscription notifications dropped because they did not decode"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Returns `None` if a recorder is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            init_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder (continuing without metrics)");
            None
        }
    }
}

/// Increment markets created counter.
pub fn inc_markets_created() {
    counter!(METRIC_MARKETS_CREATED).increment(1);
}

/// Record an accepted bet and its stake.
pub fn record_bet(amount: u64) {
    counter!(METRIC_BETS_PLACED).increment(1);
    counter!(METRIC_BET_VOLUME).increment(amount);
}

/// Increment markets resolved counter.
pub fn inc_markets_resolved() {
    counter!(METRIC_MARKETS_RESOLVED).increment(1);
}

/// Record a paid claim and its payout.
pub fn record_claim(payout: u64) {
    counter!(METRIC_CLAIMS_PAID).increment(1);
    counter!(METRIC_PAYOUT_VOLUME).increment(payout);
}

/// Increment ledger unavailable counter.
pub fn inc_ledger_unavailable(operation: &'static str) {
    counter!(METRIC_LEDGER_UNAVAILABLE, "operation" => operation).increment(1);
}

/// Increment oracle cache hit counter.
pub fn inc_oracle_cache_hits() {
    counter!(METRIC_ORACLE_CACHE_HITS).increment(1);
}

/// Increment oracle cache miss counter.
pub fn inc_oracle_cache_misses() {
    counter!(METRIC_ORACLE_CACHE_MISSES).increment(1);
}

/// Increment dropped notification counter.
pub fn inc_subscription_decode_failures() {
    counter!(METRIC_SUBSCRIPTION_DECODE_FAILURES).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for store commits.
pub fn timer_store_commit() -> LatencyTimer {
    LatencyTimer::new(METRIC_STORE_COMMIT_LATENCY)
}
