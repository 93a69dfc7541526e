//! CSRF token issuance endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;

use super::Reply;
use super::verify::enforce_cooldown;
use crate::identity::PeerAddr;
use crate::state::AppState;
use crate::stats::GatewayStats;
use gatehouse_common::{ClientIdentity, DeviceInfo, GateError, GateResponse};

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default, rename = "deviceInfo")]
    device_info: Option<DeviceInfo>,
}

/// GET /csrf-token
pub async fn get_csrf_token(
    State(state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
) -> Reply {
    let identity = state.resolver.resolve(&headers, peer, None);
    issue(&state, &identity).await.into()
}

/// POST /get-csrf-token, with an optional device descriptor
pub async fn post_csrf_token(
    State(state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let request = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return e.into(),
    };

    let identity = state
        .resolver
        .resolve(&headers, peer, request.device_info.as_ref());
    issue(&state, &identity).await.into()
}

// An empty body is allowed; the descriptor is optional
fn parse_body(body: &[u8]) -> Result<TokenRequest, GateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TokenRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GateError::InvalidInput(format!("Invalid request body: {}", e)))
}

async fn issue(state: &AppState, identity: &ClientIdentity) -> Result<GateResponse, GateError> {
    if let Err(e) = state
        .issuance_throttle
        .check_and_record(identity)
        .await?
        .into_result()
    {
        GatewayStats::bump(&state.stats.throttled);
        return Err(e);
    }
    enforce_cooldown(state, identity).await?;

    let token = state.csrf.issue(&identity.ip_address).await?;
    GatewayStats::bump(&state.stats.tokens_issued);

    tracing::debug!(ip = %identity.ip_address, "CSRF token issued");
    Ok(GateResponse::ok("CSRF token issued").with_csrf_token(token.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_body_is_empty_request() {
        let request = parse_body(b"  \n").unwrap();
        assert!(request.device_info.is_none());
    }

    #[test]
    fn test_invalid_body_is_client_error() {
        let err = parse_body(b"{\"deviceInfo\": 7}").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
