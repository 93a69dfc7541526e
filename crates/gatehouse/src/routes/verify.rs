//! Verification, cooldown polling and redirect endpoints.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};

use super::Reply;
use crate::captcha::{VerifyRequest, orchestrator};
use crate::identity::PeerAddr;
use crate::state::AppState;
use crate::stats::GatewayStats;
use gatehouse_common::constants::headers::X_CSRF_TOKEN;
use gatehouse_common::{ClientIdentity, GateError, GateResponse};

/// POST /verify
pub async fn verify(
    State(state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Reply {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return GateError::InvalidInput(rejection.body_text()).into(),
    };

    let identity = state
        .resolver
        .resolve(&headers, peer, request.device_info.as_ref());
    let header_token = headers.get(X_CSRF_TOKEN).and_then(|v| v.to_str().ok());

    orchestrator::verify(&state, &identity, &request, header_token)
        .await
        .into()
}

/// GET /check-rate-limit
pub async fn check_rate_limit(
    State(state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
) -> Reply {
    let identity = state.resolver.resolve(&headers, peer, None);
    poll(&state, &identity).await.into()
}

async fn poll(state: &AppState, identity: &ClientIdentity) -> Result<GateResponse, GateError> {
    if let Err(e) = state
        .poll_throttle
        .check_and_record(identity)
        .await?
        .into_result()
    {
        GatewayStats::bump(&state.stats.throttled);
        return Err(e);
    }
    enforce_cooldown(state, identity).await?;

    Ok(GateResponse::ok("No active cooldown"))
}

/// Fail with 429 while the identity is blocked from verifying
pub(super) async fn enforce_cooldown(
    state: &AppState,
    identity: &ClientIdentity,
) -> Result<(), GateError> {
    let remaining_secs = state.verify_throttle.remaining_cooldown(identity).await?;
    if remaining_secs > 0 {
        GatewayStats::bump(&state.stats.throttled);
        return Err(GateError::RateLimited { remaining_secs });
    }
    Ok(())
}

/// GET /get-redirect: hands out the destination once per successful verification
pub async fn get_redirect(
    State(state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
) -> Reply {
    let identity = state.resolver.resolve(&headers, peer, None);
    claim(&state, &identity).await.into()
}

async fn claim(state: &AppState, identity: &ClientIdentity) -> Result<GateResponse, GateError> {
    let grant = state
        .grants
        .claim(&identity.ip_address)
        .await?
        .ok_or_else(|| GateError::Forbidden("Verification required".to_string()))?;

    GatewayStats::bump(&state.stats.grants_claimed);
    tracing::info!(ip = %identity.ip_address, fingerprint = %identity.fingerprint, "Redirect grant claimed");

    Ok(GateResponse::ok("Redirect granted").with_redirect(Some(grant.destination_url)))
}
