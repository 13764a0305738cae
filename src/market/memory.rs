//! In-memory account store.
//!
//! Used as the collaborator in tests and by the standalone server. Failures
//! and latency can be injected to exercise timeout and rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::trace;

use super::store::{AccountListener, AccountStore, SubscriptionId};
use crate::address::Address;
use crate::error::StoreError;

/// Failure injection for the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Whether reads and scans fail.
    pub fail_reads: bool,
    /// Whether commits fail.
    pub fail_writes: bool,
    /// Simulated latency in milliseconds before each call.
    pub latency_ms: u64,
}

/// Account store backed by a map.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Address, Vec<u8>>>,
    listeners: DashMap<SubscriptionId, (Address, AccountListener)>,
    next_subscription: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
    commits: AtomicU64,
}

impl std::fmt::Debug for InMemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAccountStore")
            .field("listeners", &self.listeners.len())
            .field("commits", &self.commit_count())
            .finish_non_exhaustive()
    }
}

impl InMemoryAccountStore {
    /// Create an empty store that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with failure injection.
    pub fn with_config(config: StoreConfig) -> Self {
        let store = Self::default();
        store.set_config(config);
        store
    }

    /// Replace the failure injection settings.
    pub fn set_config(&self, config: StoreConfig) {
        self.fail_reads.store(config.fail_reads, Ordering::SeqCst);
        self.fail_writes.store(config.fail_writes, Ordering::SeqCst);
        self.latency_ms.store(config.latency_ms, Ordering::SeqCst);
    }

    /// Toggle write failures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Toggle read failures.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Set simulated latency.
    pub fn set_latency_ms(&self, latency_ms: u64) {
        self.latency_ms.store(latency_ms, Ordering::SeqCst);
    }

    /// Write raw bytes directly, bypassing failure injection. Listeners are
    /// notified as for a commit.
    pub async fn insert_raw(&self, address: Address, bytes: Vec<u8>) {
        self.accounts.write().await.insert(address, bytes.clone());
        self.notify(&[(address, bytes)]);
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.listeners.len()
    }

    async fn simulate_latency(&self) {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }

    fn notify(&self, writes: &[(Address, Vec<u8>)]) {
        for (address, bytes) in writes {
            let targets: Vec<AccountListener> = self
                .listeners
                .iter()
                .filter(|entry| entry.value().0 == *address)
                .map(|entry| entry.value().1.clone())
                .collect();
            for listener in targets {
                listener(bytes);
            }
        }
    }
}

impl AccountStore for InMemoryAccountStore {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, StoreError> {
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock read failure".to_string()));
        }
        Ok(self.accounts.read().await.get(address).cloned())
    }

    async fn commit(&self, writes: Vec<(Address, Vec<u8>)>) -> Result<(), StoreError> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock write failure".to_string()));
        }

        {
            let mut accounts = self.accounts.write().await;
            for (address, bytes) in &writes {
                accounts.insert(*address, bytes.clone());
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        trace!(accounts = writes.len(), "committed");

        self.notify(&writes);
        Ok(())
    }

    async fn scan(&self, prefix: &[u8]) -> Result<Vec<(Address, Vec<u8>)>, StoreError> {
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock scan failure".to_string()));
        }
        let accounts = self.accounts.read().await;
        Ok(accounts
            .iter()
            .filter(|(_, bytes)| bytes.starts_with(prefix))
            .map(|(address, bytes)| (*address, bytes.clone()))
            .collect())
    }

    fn subscribe(
        &self,
        address: Address,
        listener: AccountListener,
    ) -> Result<SubscriptionId, StoreError> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners.insert(id, (address, listener));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }
}
