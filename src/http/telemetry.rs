//! Telemetry: fire-and-forget event ring buffer with Prometheus text output

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::types::TelemetryEvent;
use crate::util::time::unix_millis;

/// Ring capacity for recently ingested events.
const RING_CAPACITY: usize = 1000;
/// Most-recent events returned by a listing.
const LIST_LIMIT: usize = 100;

#[derive(Default)]
struct StoreInner {
    recent: VecDeque<TelemetryEvent>,
    total_ingested: u64,
    by_type: HashMap<String, u64>,
}

/// In-memory telemetry sink. Ingest never fails; the ring silently evicts
/// the oldest record at capacity.
#[derive(Default)]
pub struct TelemetryStore {
    inner: RwLock<StoreInner>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&self, event: TelemetryEvent) {
        let mut inner = self.inner.write();
        inner.total_ingested += 1;
        *inner.by_type.entry(event.event_type.clone()).or_insert(0) += 1;
        inner.recent.push_back(event);
        while inner.recent.len() > RING_CAPACITY {
            inner.recent.pop_front();
        }
    }

    /// Most recent events, oldest first, at most `limit`.
    pub fn list_recent(&self, limit: usize) -> Vec<TelemetryEvent> {
        let inner = self.inner.read();
        let take = limit.min(inner.recent.len());
        inner
            .recent
            .iter()
            .skip(inner.recent.len() - take)
            .cloned()
            .collect()
    }

    pub fn total_ingested(&self) -> u64 {
        self.inner.read().total_ingested
    }

    /// Prometheus text exposition of the ingest counters.
    pub fn render_metrics(&self) -> String {
        let inner = self.inner.read();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# HELP velocity_telemetry_events_total Total telemetry events ingested"
        );
        let _ = writeln!(out, "# TYPE velocity_telemetry_events_total counter");
        let _ = writeln!(
            out,
            "velocity_telemetry_events_total {}",
            inner.total_ingested
        );
        for (event_type, count) in &inner.by_type {
            let _ = writeln!(
                out,
                "velocity_telemetry_events_by_type{{event_type=\"{event_type}\"}} {count}"
            );
        }
        out
    }
}

#[derive(Clone)]
pub struct TelemetryState {
    pub store: Arc<TelemetryStore>,
}

/// Build the telemetry router
pub fn build_router(state: TelemetryState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/events", get(list_handler).post(ingest_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ingest_handler(
    State(state): State<TelemetryState>,
    Json(mut event): Json<TelemetryEvent>,
) -> Response {
    if event.event_type.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "event_type_required" })),
        )
            .into_response();
    }
    if event.event_id.is_empty() {
        event.event_id = format!("ev_{}", Uuid::new_v4());
    }
    if event.timestamp == 0 {
        event.timestamp = unix_millis();
    }

    let event_id = event.event_id.clone();
    state.store.ingest(event);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted", "event_id": event_id })),
    )
        .into_response()
}

async fn list_handler(State(state): State<TelemetryState>) -> Json<serde_json::Value> {
    let events = state.store.list_recent(LIST_LIMIT);
    Json(serde_json::json!({
        "count": events.len(),
        "events": events,
    }))
}

async fn metrics_handler(State(state): State<TelemetryState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.store.render_metrics(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, event_id: &str) -> TelemetryEvent {
        TelemetryEvent {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            timestamp: 1,
            ..TelemetryEvent::default()
        }
    }

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let store = TelemetryStore::new();
        for i in 0..(RING_CAPACITY + 50) {
            store.ingest(event("goal", &format!("ev_{i}")));
        }
        assert_eq!(store.total_ingested(), (RING_CAPACITY + 50) as u64);
        let recent = store.list_recent(RING_CAPACITY + 50);
        assert_eq!(recent.len(), RING_CAPACITY);
        // Oldest entries were evicted.
        assert_eq!(recent[0].event_id, "ev_50");
    }

    #[test]
    fn list_recent_returns_newest_tail() {
        let store = TelemetryStore::new();
        for i in 0..10 {
            store.ingest(event("shot_on_goal", &format!("ev_{i}")));
        }
        let recent = store.list_recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].event_id, "ev_7");
        assert_eq!(recent[2].event_id, "ev_9");
    }

    #[test]
    fn metrics_render_totals_and_types() {
        let store = TelemetryStore::new();
        store.ingest(event("goal", "ev_1"));
        store.ingest(event("goal", "ev_2"));
        store.ingest(event("demo", "ev_3"));

        let text = store.render_metrics();
        assert!(text.contains("# TYPE velocity_telemetry_events_total counter"));
        assert!(text.contains("velocity_telemetry_events_total 3"));
        assert!(text.contains("velocity_telemetry_events_by_type{event_type=\"goal\"} 2"));
        assert!(text.contains("velocity_telemetry_events_by_type{event_type=\"demo\"} 1"));
    }
}
