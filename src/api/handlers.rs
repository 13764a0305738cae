//! HTTP API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::address::Address;
use crate::error::{ErrorClass, LedgerError};
use crate::market::{
    BetPlaced, InMemoryAccountStore, LedgerStats, Market, MarketLedger, MarketView, NewMarket,
    Position, Side,
};
use crate::oracle::{EventAccount, EventId, OracleReader};
use crate::pricing;

/// Ledger served by the binary.
pub type Ledger = MarketLedger<InMemoryAccountStore>;
/// Oracle reader served by the binary.
pub type Oracle = OracleReader<InMemoryAccountStore>;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the ledger has been hydrated and accepts requests.
    pub ready: Arc<AtomicBool>,
    /// Market ledger.
    pub ledger: Arc<Ledger>,
    /// Oracle reader.
    pub oracle: Arc<Oracle>,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(ledger: Arc<Ledger>, oracle: Arc<Oracle>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            ledger,
            oracle,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Ledger error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error name.
    pub error: &'static str,
    /// Error class.
    pub class: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the request may be retried.
    pub retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.0.class();
        let status = match (&self.0, class) {
            (LedgerError::NotFound { .. }, _) => StatusCode::NOT_FOUND,
            (_, ErrorClass::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorClass::StateConflict) => StatusCode::CONFLICT,
            (_, ErrorClass::Codec) => StatusCode::INTERNAL_SERVER_ERROR,
            (_, ErrorClass::Transient) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorResponse {
            error: self.0.code(),
            class: class.to_string(),
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Markets currently held.
    pub markets: usize,
}

/// Body of `POST /api/v1/markets/:address/bets`.
#[derive(Debug, Deserialize)]
pub struct BetRequest {
    /// Bettor identity.
    pub bettor: Address,
    /// Stake in smallest units.
    pub amount: u64,
    /// Side backed.
    pub prediction: Side,
}

/// Body of `POST /api/v1/markets/:address/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Identity resolving the market; must be the creator.
    pub resolver: Address,
    /// Winning side.
    pub outcome: Side,
    /// Oracle event to check the outcome against.
    #[serde(default)]
    pub event_id: Option<EventId>,
}

/// Body of `POST /api/v1/markets/:address/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// Bettor claiming.
    pub bettor: Address,
}

/// Response of a successful claim.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    /// Bet address.
    pub bet: Address,
    /// Amount owed to the bettor.
    pub payout: u64,
}

/// Response of market creation.
#[derive(Debug, Serialize)]
pub struct CreatedMarket {
    /// Derived market address.
    pub address: Address,
    /// Stored record.
    pub market: Market,
}

/// Query of `GET /api/v1/markets/:address/quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    /// Side to back.
    pub side: Side,
    /// Stake to price.
    pub amount: u64,
}

/// Estimated payout of a new stake.
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    /// Side backed.
    pub side: Side,
    /// Stake priced.
    pub amount: u64,
    /// Payout if the side wins, with this stake included in the pools.
    pub potential_payout: u64,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        markets: state.ledger.stats().total_markets,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed\n".to_string(),
        ),
    }
}

/// List every market, latest end time first.
pub async fn list_markets(State(state): State<AppState>) -> Json<Vec<MarketView>> {
    Json(state.ledger.list_markets())
}

/// Create a market.
pub async fn create_market(
    State(state): State<AppState>,
    Json(params): Json<NewMarket>,
) -> Result<(StatusCode, Json<CreatedMarket>), ApiError> {
    let (address, market) = state.ledger.create_market(params).await?;
    Ok((StatusCode::CREATED, Json(CreatedMarket { address, market })))
}

/// One market with pricing.
pub async fn get_market(
    State(state): State<AppState>,
    Path(address): Path<Address>,
) -> ApiResult<MarketView> {
    Ok(Json(state.ledger.market_view(&address)?))
}

/// Price a prospective stake.
pub async fn quote(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<QuoteResponse> {
    let view = state.ledger.market_view(&address)?;
    let potential_payout =
        pricing::potential_payout(query.amount, query.side, view.market.pools())?;
    Ok(Json(QuoteResponse {
        side: query.side,
        amount: query.amount,
        potential_payout,
    }))
}

/// Place or top up a bet.
pub async fn place_bet(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Json(request): Json<BetRequest>,
) -> ApiResult<BetPlaced> {
    let placed = state
        .ledger
        .place_bet(address, request.bettor, request.amount, request.prediction)
        .await?;
    Ok(Json(placed))
}

/// Resolve a market, optionally checked against an oracle assertion.
pub async fn resolve_market(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Market> {
    let market = match &request.event_id {
        Some(event_id) => {
            state
                .ledger
                .resolve_with_oracle(
                    address,
                    request.resolver,
                    request.outcome,
                    &state.oracle,
                    event_id,
                )
                .await?
        }
        None => {
            state
                .ledger
                .resolve_market(address, request.resolver, request.outcome)
                .await?
        }
    };
    Ok(Json(market))
}

/// Claim winnings of a resolved market.
pub async fn claim(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<ClaimResponse> {
    let payout = state.ledger.claim_winnings(address, request.bettor).await?;
    let (bet, _) = state
        .ledger
        .deriver()
        .bet_address(&address, &request.bettor)
        .map_err(LedgerError::from)?;
    Ok(Json(ClaimResponse { bet, payout }))
}

/// Every position held by a bettor.
pub async fn positions(
    State(state): State<AppState>,
    Path(user): Path<Address>,
) -> ApiResult<Vec<Position>> {
    Ok(Json(state.ledger.positions_for(&user)?))
}

/// Aggregate ledger statistics.
pub async fn stats(State(state): State<AppState>) -> Json<LedgerStats> {
    Json(state.ledger.stats())
}

/// Every oracle event, latest end time first.
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<EventAccount>> {
    Ok(Json(state.oracle.all_events().await?))
}

/// One oracle event.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<EventAccount> {
    let id = EventId::new(event_id).map_err(|e| LedgerError::InvalidText {
        field: "event_id",
        reason: e.to_string(),
    })?;
    Ok(Json(state.oracle.get_event(&id).await?))
}
