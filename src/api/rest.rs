// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The engine is read-mostly from the
// outside: the only write surface is `POST /api/v1/outcomes`, which lets an
// external settlement source feed indicator outcomes into the trust table.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/decisions", get(decisions))
        .route("/api/v1/outcomes", get(outcomes))
        .route("/api/v1/outcomes", post(record_outcome))
        .route("/api/v1/history", get(history))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Snapshots
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn decisions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_decisions())
}

async fn outcomes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_outcomes())
}

async fn history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot().indicator_trust)
}

// =============================================================================
// External outcome write-back
// =============================================================================

#[derive(Deserialize)]
struct RecordOutcomeRequest {
    name: String,
    success: bool,
}

#[derive(Serialize)]
struct RecordOutcomeResponse {
    name: String,
    trust_factor: f64,
}

/// Record one settled outcome for a named indicator.
///
/// The confirmation engine writes outcomes internally; this endpoint exists
/// for settlement sources living outside the process.
async fn record_outcome(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordOutcomeRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "indicator name must not be empty").into_response();
    }

    state.history.record_outcome(&req.name, req.success);
    state.bump_version();
    info!(name = %req.name, success = req.success, "external outcome recorded");

    let resp = RecordOutcomeResponse {
        trust_factor: state.history.trust_factor(&req.name),
        name: req.name,
    };
    (StatusCode::OK, Json(resp)).into_response()
}
