//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    claim, create_market, get_event, get_market, health, list_events, list_markets, metrics,
    place_bet, positions, quote, ready, resolve_market, stats, AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        // Markets
        .route("/api/v1/markets", get(list_markets).post(create_market))
        .route("/api/v1/markets/:address", get(get_market))
        .route("/api/v1/markets/:address/quote", get(quote))
        .route("/api/v1/markets/:address/bets", post(place_bet))
        .route("/api/v1/markets/:address/resolve", post(resolve_market))
        .route("/api/v1/markets/:address/claim", post(claim))
        // Bettors
        .route("/api/v1/positions/:user", get(positions))
        .route("/api/v1/stats", get(stats))
        // Oracle
        .route("/api/v1/events", get(list_events))
        .route("/api/v1/events/:event_id", get(get_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
