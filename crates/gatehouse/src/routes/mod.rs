//! HTTP route handlers for Gatehouse.

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use gatehouse_common::{Axis, GateError, GateResponse};

mod health;
mod token;
mod verify;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // Anti-forgery tokens
        .route("/csrf-token", get(token::get_csrf_token))
        .route("/get-csrf-token", post(token::post_csrf_token))

        // Verification
        .route("/check-rate-limit", get(verify::check_rate_limit))
        .route("/verify", post(verify::verify))
        .route("/get-redirect", get(verify::get_redirect));

    if state.config.admin_token.is_some() {
        router = router.nest("/admin", admin_routes(state.clone()));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A status code plus the structured reply body
#[derive(Debug)]
pub struct Reply(pub StatusCode, pub GateResponse);

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<GateError> for Reply {
    fn from(err: GateError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(error = %err, status = status.as_u16(), "Request failed");
        }
        Reply(status, GateResponse::from(&err))
    }
}

impl From<Result<GateResponse, GateError>> for Reply {
    fn from(result: Result<GateResponse, GateError>) -> Self {
        match result {
            Ok(body) => Reply(StatusCode::OK, body),
            Err(err) => err.into(),
        }
    }
}

fn failure(status: StatusCode, message: &str) -> Reply {
    Reply(
        status,
        GateResponse {
            success: false,
            message: message.to_string(),
            status: Some(status.as_u16()),
            ..Default::default()
        },
    )
}

/// Admin routes (throttle inspection and unblocking)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/throttle/{axis}/{id}",
            get(inspect_throttle).delete(clear_throttle),
        )
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (state.config.admin_token.as_deref(), provided) {
        (Some(expected), Some(token)) if tokens_match(expected, token) => next.run(request).await,
        _ => failure(StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

/// Constant-time over equal-length digests, so neither content nor length leaks
fn tokens_match(expected: &str, provided: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let provided = Sha256::digest(provided.as_bytes());
    bool::from(expected.as_slice().ct_eq(provided.as_slice()))
}

// === Admin Handlers ===

fn parse_axis(tag: &str) -> Result<Axis, Reply> {
    Axis::from_tag(tag)
        .ok_or_else(|| GateError::InvalidInput(format!("Unknown axis: {}", tag)).into())
}

async fn inspect_throttle(
    State(state): State<AppState>,
    Path((axis, id)): Path<(String, String)>,
) -> Response {
    let axis = match parse_axis(&axis) {
        Ok(axis) => axis,
        Err(reply) => return reply.into_response(),
    };

    match state.verify_throttle.inspect(axis, &id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, "No throttle record").into_response(),
        Err(e) => Reply::from(e).into_response(),
    }
}

async fn clear_throttle(
    State(state): State<AppState>,
    Path((axis, id)): Path<(String, String)>,
) -> Reply {
    let axis = match parse_axis(&axis) {
        Ok(axis) => axis,
        Err(reply) => return reply,
    };

    tracing::info!(axis = %axis, id = %id, "Admin unblock requested");
    state
        .verify_throttle
        .clear(axis, &id)
        .await
        .map(|_| GateResponse::ok("Throttle record cleared"))
        .into()
}
