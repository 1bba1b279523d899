//! Matchmaker HTTP surface over the queue engine

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::matchmaking::QueueManager;
use crate::types::{QueueJoinRequest, QueuePollResponse};

#[derive(Clone)]
pub struct MatchmakerState {
    pub queue: Arc<QueueManager>,
}

/// Build the matchmaker router
pub fn build_router(state: MatchmakerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/queue/join", post(join_handler))
        .route("/v1/queue/poll", get(poll_handler))
        .route("/v1/queue/leave", post(leave_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}

async fn join_handler(
    State(state): State<MatchmakerState>,
    Json(req): Json<QueueJoinRequest>,
) -> Response {
    if req.player_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "player_id_required");
    }

    let resp = state.queue.join(req);
    info!(ticket_id = %resp.ticket_id, "ticket queued");
    Json(resp).into_response()
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    #[serde(default)]
    ticket_id: String,
}

async fn poll_handler(
    State(state): State<MatchmakerState>,
    Query(query): Query<PollQuery>,
) -> Response {
    if query.ticket_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "ticket_id_required");
    }

    let resp: QueuePollResponse = state.queue.poll(&query.ticket_id);
    Json(resp).into_response()
}

#[derive(Debug, Deserialize)]
struct LeaveRequest {
    #[serde(default)]
    ticket_id: String,
}

async fn leave_handler(
    State(state): State<MatchmakerState>,
    Json(req): Json<LeaveRequest>,
) -> Response {
    if req.ticket_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "ticket_id_required");
    }
    if !state.queue.leave(&req.ticket_id) {
        return error_response(StatusCode::NOT_FOUND, "ticket_not_found");
    }
    Json(serde_json::json!({ "status": "left" })).into_response()
}
