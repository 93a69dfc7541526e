//! Health check endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;

use crate::state::AppState;
use crate::store::KvStore;
use gatehouse_common::MetricsSnapshot;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    store: &'static str,
}

/// Readiness check (is the backing store reachable?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            store: state.store.backend_name(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, store = state.store.backend_name(), "Store not ready");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    store: &'static str,
    #[serde(flatten)]
    counters: MetricsSnapshot,
}

/// Metrics endpoint (for monitoring)
pub async fn metrics(
    State(state): State<AppState>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        store: state.store.backend_name(),
        counters: state.stats.snapshot(),
    })
}
