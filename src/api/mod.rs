//! HTTP API module for health, metrics, and ledger endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AppState, Ledger, Oracle};
pub use routes::create_router;
