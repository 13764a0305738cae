//! Oracle Reader: decoded, cached access to oracle event and assertion
//! accounts, plus change subscriptions.

mod cache;
mod reader;
mod types;

pub use cache::TtlCache;
pub use reader::{OracleOptions, OracleReader};
pub use types::{binary_outcome, EventAccount, EventId, OracleAssertion, EVENT_ID_LEN};
