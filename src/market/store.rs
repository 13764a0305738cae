//! Port to the ledger/RPC collaborator that holds raw account bytes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::error::StoreError;

/// Callback invoked with the new bytes of a watched account.
pub type AccountListener = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Handle returned by [`AccountStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Raw account storage keyed by address.
///
/// `commit` is the single atomic write: either every entry becomes visible
/// or none does.
pub trait AccountStore: Send + Sync + 'static {
    /// Fetch the bytes stored at an address.
    fn get_account(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Atomically write a batch of accounts.
    fn commit(
        &self,
        writes: Vec<(Address, Vec<u8>)>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All accounts whose bytes start with `prefix`.
    fn scan(
        &self,
        prefix: &[u8],
    ) -> impl Future<Output = Result<Vec<(Address, Vec<u8>)>, StoreError>> + Send;

    /// Watch an address; the listener sees every committed write to it.
    fn subscribe(
        &self,
        address: Address,
        listener: AccountListener,
    ) -> Result<SubscriptionId, StoreError>;

    /// Stop a subscription. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Run a store call under a deadline. An elapsed deadline becomes
/// [`StoreError::Timeout`]; the call's future is dropped, so nothing it had
/// not yet committed becomes visible.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
