//! WebAPI - health and stats endpoints
//!
//! ## Responsibilities
//!
//! - `/healthz` for container orchestration probes
//! - `/api/stats` exposing the pipeline counters

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/stats", get(pipeline_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic service health for orchestration probes.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "platewatch",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Pipeline counters plus the tracked-events gauge.
async fn pipeline_stats(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.stats.snapshot();
    Json(json!({
        "stats": snapshot,
        "current_events_tracked": state.tracker.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_response_shape() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.service, "platewatch");
        assert!(!response.version.is_empty());
    }
}
