//! Cached reader over oracle event and assertion accounts.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use super::cache::TtlCache;
use super::types::{EventAccount, EventId, OracleAssertion};
use crate::address::{Address, AddressDeriver};
use crate::codec::{self, AccountKind, AccountRecord};
use crate::error::{LedgerError, Result};
use crate::market::{with_timeout, AccountListener, AccountStore, SubscriptionId};
use crate::metrics;

/// Oracle reader settings.
#[derive(Debug, Clone)]
pub struct OracleOptions {
    /// How long a decoded record is served from cache.
    pub cache_ttl: Duration,
    /// Timeout around every store read.
    pub rpc_timeout: Duration,
}

impl Default for OracleOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            rpc_timeout: Duration::from_secs(2),
        }
    }
}

/// Reads oracle accounts from the store, decoding and caching them.
pub struct OracleReader<S> {
    store: Arc<S>,
    deriver: AddressDeriver,
    events: Arc<TtlCache<EventAccount>>,
    assertions: Arc<TtlCache<OracleAssertion>>,
    subscriptions: DashMap<SubscriptionId, Address>,
    options: OracleOptions,
}

impl<S: AccountStore> OracleReader<S> {
    /// Create a reader over `store`.
    pub fn new(store: Arc<S>, deriver: AddressDeriver, options: OracleOptions) -> Self {
        Self {
            store,
            deriver,
            events: Arc::new(TtlCache::new(options.cache_ttl)),
            assertions: Arc::new(TtlCache::new(options.cache_ttl)),
            subscriptions: DashMap::new(),
            options,
        }
    }

    /// Address of an event account.
    pub fn event_address(&self, id: &EventId) -> Result<Address> {
        Ok(self.deriver.event_address(id.seed())?.0)
    }

    /// Address of an oracle assertion account.
    pub fn oracle_address(&self, id: &EventId) -> Result<Address> {
        Ok(self.deriver.oracle_address(id.seed())?.0)
    }

    /// Fetch an event, from cache if fresh.
    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn get_event(&self, id: &EventId) -> Result<EventAccount> {
        let address = self.event_address(id)?;
        self.fetch(address, &self.events).await
    }

    /// Fetch an oracle assertion, from cache if fresh.
    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn get_oracle_assertion(&self, id: &EventId) -> Result<OracleAssertion> {
        let address = self.oracle_address(id)?;
        self.fetch(address, &self.assertions).await
    }

    /// Every decodable event account, latest end time first. Malformed
    /// accounts are logged and skipped.
    #[instrument(skip(self))]
    pub async fn all_events(&self) -> Result<Vec<EventAccount>> {
        let prefix = AccountKind::Event.discriminator();
        let raw = with_timeout(self.options.rpc_timeout, self.store.scan(&prefix))
            .await
            .map_err(|e| unavailable("oracle_scan", e))?;

        let mut events = Vec::with_capacity(raw.len());
        for (address, bytes) in raw {
            match codec::decode::<EventAccount>(&bytes) {
                Ok(event) => {
                    self.events.insert(address, event.clone());
                    events.push(event);
                }
                Err(e) => warn!(%address, error = %e, "Skipping malformed event account"),
            }
        }

        events.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        debug!(count = events.len(), "Listed events");
        Ok(events)
    }

    /// Watch an event. Every committed change is decoded, cached and passed
    /// to `on_change`; changes that fail to decode are logged and dropped.
    pub fn subscribe_event<F>(&self, id: &EventId, on_change: F) -> Result<SubscriptionId>
    where
        F: Fn(EventAccount) + Send + Sync + 'static,
    {
        let address = self.event_address(id)?;
        self.subscribe(address, self.events.clone(), on_change)
    }

    /// Watch an oracle assertion. Same delivery rules as
    /// [`subscribe_event`](Self::subscribe_event).
    pub fn subscribe_oracle<F>(&self, id: &EventId, on_change: F) -> Result<SubscriptionId>
    where
        F: Fn(OracleAssertion) + Send + Sync + 'static,
    {
        let address = self.oracle_address(id)?;
        self.subscribe(address, self.assertions.clone(), on_change)
    }

    /// Cancel a subscription made through this reader.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscriptions.remove(&id) {
            Some((_, address)) => {
                debug!(subscription = id.0, %address, "Unsubscribed");
                self.store.unsubscribe(id)
            }
            None => false,
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Drop every cached record.
    pub fn clear_cache(&self) {
        self.events.clear();
        self.assertions.clear();
    }

    /// Number of cached records of both kinds.
    pub fn cache_size(&self) -> usize {
        self.events.len() + self.assertions.len()
    }

    async fn fetch<T>(&self, address: Address, cache: &TtlCache<T>) -> Result<T>
    where
        T: AccountRecord + Clone,
    {
        if let Some(record) = cache.get(&address) {
            metrics::inc_oracle_cache_hits();
            return Ok(record);
        }
        metrics::inc_oracle_cache_misses();

        let bytes = with_timeout(self.options.rpc_timeout, self.store.get_account(&address))
            .await
            .map_err(|e| unavailable("oracle_read", e))?
            .ok_or(LedgerError::NotFound {
                kind: T::KIND.name(),
                address,
            })?;

        let record = codec::decode::<T>(&bytes)?;
        cache.insert(address, record.clone());
        Ok(record)
    }

    fn subscribe<T, F>(
        &self,
        address: Address,
        cache: Arc<TtlCache<T>>,
        on_change: F,
    ) -> Result<SubscriptionId>
    where
        T: AccountRecord + Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let listener: AccountListener = Arc::new(move |bytes: &[u8]| {
            match codec::decode::<T>(bytes) {
                Ok(record) => {
                    cache.insert(address, record.clone());
                    on_change(record);
                }
                Err(e) => {
                    metrics::inc_subscription_decode_failures();
                    warn!(%address, error = %e, "Dropping malformed account notification");
                }
            }
        });

        let id = self.store.subscribe(address, listener)?;
        self.subscriptions.insert(id, address);
        debug!(subscription = id.0, %address, kind = T::KIND.name(), "Subscribed");
        Ok(id)
    }
}

fn unavailable(operation: &'static str, err: crate::error::StoreError) -> LedgerError {
    metrics::inc_ledger_unavailable(operation);
    warn!(operation, error = %err, "Store call failed");
    err.into()
}
