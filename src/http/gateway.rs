//! Gateway: guest token issuance and matchmaking proxy
//!
//! The gateway is the only authenticated surface. Tokens are opaque random
//! bearer values held in an in-memory session map with a 24 h TTL; the
//! matchmaker behind it is trusted and reached over plain HTTP.

use std::time::Duration;

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::GatewayConfig;
use crate::types::{GuestAuthRequest, GuestAuthResponse, QueueJoinRequest};
use crate::util::id::next_id;
use crate::util::time::unix_seconds;

const TOKEN_BYTES: usize = 32;
const SESSION_TTL_SECS: i64 = 24 * 60 * 60;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// An authenticated guest session, keyed by its bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub player_id: String,
    pub display_name: String,
    pub expires_at: i64,
}

impl AuthSession {
    pub fn is_valid(&self, now_unix: i64) -> bool {
        self.expires_at >= now_unix
    }
}

/// Shared gateway state
#[derive(Clone)]
pub struct GatewayState {
    sessions: Arc<DashMap<String, AuthSession>>,
    http: reqwest::Client,
    matchmaker_base: String,
}

impl GatewayState {
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            sessions: Arc::new(DashMap::new()),
            http: reqwest::Client::builder()
                .timeout(UPSTREAM_TIMEOUT)
                .build()?,
            matchmaker_base: config.matchmaker_http.trim_end_matches('/').to_string(),
        })
    }

    fn session_for(&self, token: &str) -> Option<AuthSession> {
        let session = self.sessions.get(token)?.clone();
        session.is_valid(unix_seconds()).then_some(session)
    }
}

/// Gateway error responses. Auth failures never reveal which token was wrong.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid_auth")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("matchmaker_unavailable")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid_auth"),
            ApiError::BadRequest(code) => (StatusCode::BAD_REQUEST, *code),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "matchmaker_unavailable"),
        };
        (status, Json(serde_json::json!({ "error": code }))).into_response()
    }
}

/// Build the gateway router
pub fn build_router(state: GatewayState) -> Router {
    let protected = Router::new()
        .route("/v1/matchmaking/join", post(matchmaking_join_handler))
        .route("/v1/matchmaking/poll", get(matchmaking_poll_handler))
        .route("/v1/matchmaking/leave", post(matchmaking_leave_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/auth/guest", post(guest_auth_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn guest_auth_handler(
    State(state): State<GatewayState>,
    Json(req): Json<GuestAuthRequest>,
) -> Json<GuestAuthResponse> {
    let display_name = if req.display_name.is_empty() {
        "pilot".to_string()
    } else {
        req.display_name
    };

    let player_id = next_id("player");
    let token = random_token();
    let expires_at = unix_seconds() + SESSION_TTL_SECS;

    state.sessions.insert(
        token.clone(),
        AuthSession {
            player_id: player_id.clone(),
            display_name: display_name.clone(),
            expires_at,
        },
    );
    info!(player_id = %player_id, "issued guest session");

    Json(GuestAuthResponse {
        player_id,
        display_name,
        token,
        expires_at,
    })
}

/// Middleware requiring a valid bearer session
async fn require_auth(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let session = state.session_for(token).ok_or(ApiError::Unauthorized)?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

async fn matchmaking_join_handler(
    State(state): State<GatewayState>,
    Extension(session): Extension<AuthSession>,
    Json(mut req): Json<QueueJoinRequest>,
) -> Result<Response, ApiError> {
    // The session, not the body, decides who is queueing.
    req.player_id = session.player_id;
    req.display_name = session.display_name;
    if req.region.is_empty() {
        req.region = "us-east".to_string();
    }
    if req.playlist.is_empty() {
        req.playlist = "ranked-1v1".to_string();
    }
    if req.mmr <= 0 {
        req.mmr = 1000;
    }

    let upstream = state
        .http
        .post(format!("{}/v1/queue/join", state.matchmaker_base))
        .json(&req)
        .send()
        .await?;
    passthrough(upstream).await
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    #[serde(default)]
    ticket_id: String,
}

async fn matchmaking_poll_handler(
    State(state): State<GatewayState>,
    Query(query): Query<PollQuery>,
) -> Result<Response, ApiError> {
    if query.ticket_id.is_empty() {
        return Err(ApiError::BadRequest("ticket_id_required"));
    }

    let upstream = state
        .http
        .get(format!("{}/v1/queue/poll", state.matchmaker_base))
        .query(&[("ticket_id", query.ticket_id)])
        .send()
        .await?;
    passthrough(upstream).await
}

async fn matchmaking_leave_handler(
    State(state): State<GatewayState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let upstream = state
        .http
        .post(format!("{}/v1/queue/leave", state.matchmaker_base))
        .json(&body)
        .send()
        .await?;
    passthrough(upstream).await
}

/// Relay the upstream status and JSON body verbatim.
async fn passthrough(upstream: reqwest::Response) -> Result<Response, ApiError> {
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = upstream.bytes().await?;
    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn random_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_32_random_bytes_base64url() {
        let token = random_token();
        let decoded = URL_SAFE_NO_PAD.decode(&token).expect("valid base64url");
        assert_eq!(decoded.len(), TOKEN_BYTES);
        assert_ne!(token, random_token());
    }

    #[test]
    fn session_expiry_is_checked() {
        let now = unix_seconds();
        let live = AuthSession {
            player_id: "p".into(),
            display_name: "p".into(),
            expires_at: now + 60,
        };
        let stale = AuthSession {
            expires_at: now - 1,
            ..live.clone()
        };
        assert!(live.is_valid(now));
        assert!(!stale.is_valid(now));
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let config = GatewayConfig {
            addr: "0.0.0.0:9000".parse().unwrap(),
            matchmaker_http: "http://localhost:9001".to_string(),
            log_level: "info".to_string(),
        };
        let state = GatewayState::new(&config).unwrap();
        state.sessions.insert(
            "tok".to_string(),
            AuthSession {
                player_id: "p".into(),
                display_name: "p".into(),
                expires_at: unix_seconds() - 10,
            },
        );
        assert!(state.session_for("tok").is_none());
        assert!(state.session_for("missing").is_none());
    }
}
