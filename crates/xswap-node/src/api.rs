//! HTTP API server for the xswap node.
//!
//! Exposes swapper status, pending swaps per home-chain address, block
//! resync and manual settlement.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use xswap_core::{Address, ChainSwap, Hash};
use xswap_engine::{EngineError, SwapperStatus, TokenSwapper};

/// Shared state handed to every handler.
pub struct ApiState {
    pub swapper: Arc<TokenSwapper>,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(swapper: Arc<TokenSwapper>) -> Self {
        Self {
            swapper,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub swapper: SwapperStatus,
}

#[derive(Serialize)]
pub struct PendingSwapsResponse {
    pub address: String,
    pub swaps: Vec<ChainSwap>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct ResyncRequest {
    pub platform: String,
    pub height: u64,
}

#[derive(Serialize)]
pub struct ResyncResponse {
    pub platform: String,
    pub height: u64,
}

#[derive(Deserialize)]
pub struct SettleRequest {
    pub source_platform: String,
    pub destination_platform: String,
    pub hash: String,
}

#[derive(Serialize)]
pub struct SettleResponse {
    pub hash: Hash,
    /// Destination transaction, `None` while the payout is in flight.
    pub settlement: Option<Hash>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn engine_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::UnknownPlatform(_) => StatusCode::NOT_FOUND,
        EngineError::HomeChain(_) | EngineError::Watcher(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: xswap_watcher::error_chain(&e),
        }),
    )
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let swapper = state.swapper.status().await.map_err(engine_error)?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
        uptime_secs: state.started.elapsed().as_secs(),
        swapper,
    }))
}

async fn handle_pending_swaps(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> Result<Json<PendingSwapsResponse>, ApiError> {
    let parsed: Address = address.parse().map_err(bad_request)?;
    let swaps = state
        .swapper
        .get_pending_swaps(&parsed)
        .await
        .map_err(engine_error)?;
    let count = swaps.len();
    Ok(Json(PendingSwapsResponse {
        address,
        swaps,
        count,
    }))
}

async fn handle_resync(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ResyncRequest>,
) -> Result<Json<ResyncResponse>, ApiError> {
    state
        .swapper
        .resync_block(&req.platform, req.height)
        .map_err(engine_error)?;
    Ok(Json(ResyncResponse {
        platform: req.platform,
        height: req.height,
    }))
}

async fn handle_settle(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SettleResponse>, ApiError> {
    let hash: Hash = req.hash.parse().map_err(bad_request)?;
    let settlement = state
        .swapper
        .settle_swap(&req.source_platform, &req.destination_platform, hash)
        .await
        .map_err(engine_error)?;
    Ok(Json(SettleResponse { hash, settlement }))
}

// --- Server ---

pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/swaps/{address}", get(handle_pending_swaps))
        .route("/api/v1/resync", post(handle_resync))
        .route("/api/v1/settle", post(handle_settle))
        .with_state(state)
}

pub async fn start_api_server(listen_addr: SocketAddr, state: Arc<ApiState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
