//! Time-bounded cache of decoded oracle records.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::address::Address;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// Per-address cache whose entries expire after a fixed TTL.
///
/// Uses the tokio clock so tests can pause and advance time.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<Address, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Value for `address` if present and not expired. Expired entries are
    /// evicted on access.
    pub fn get(&self, address: &Address) -> Option<V> {
        let stale_at = {
            let entry = self.entries.get(address)?;
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            entry.fetched_at
        };
        self.entries
            .remove_if(address, |_, entry| entry.fetched_at == stale_at);
        None
    }

    /// Store a value, restarting its TTL.
    pub fn insert(&self, address: Address, value: V) {
        self.entries.insert(
            address,
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop one entry.
    pub fn invalidate(&self, address: &Address) {
        self.entries.remove(address);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
