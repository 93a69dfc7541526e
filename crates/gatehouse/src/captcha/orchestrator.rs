//! Verification flow: CSRF, bot screen, throttle, upstream, grant.

use serde::Deserialize;

use crate::state::AppState;
use crate::stats::GatewayStats;
use gatehouse_common::constants::UNKNOWN;
use gatehouse_common::{ClientIdentity, DeviceInfo, GateError, GateResponse};

/// Body of POST /verify
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default, rename = "g-recaptcha-response", alias = "token")]
    pub captcha_response: Option<String>,

    #[serde(default, rename = "csrf-token")]
    pub csrf_token: Option<String>,

    #[serde(default, rename = "deviceInfo")]
    pub device_info: Option<DeviceInfo>,
}

/// Run one verification attempt for `identity`.
///
/// Cheap local checks come first so rejected requests never reach the
/// upstream verifier. The throttle attempt is refunded when the upstream
/// fails, so an outage does not lock clients out.
pub async fn verify(
    state: &AppState,
    identity: &ClientIdentity,
    request: &VerifyRequest,
    header_token: Option<&str>,
) -> Result<GateResponse, GateError> {
    GatewayStats::bump(&state.stats.verify_requests);

    let csrf_token = request
        .csrf_token
        .as_deref()
        .or(header_token)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GateError::InvalidInput("Missing CSRF token".to_string()))?;

    let captcha_response = request
        .captcha_response
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| GateError::InvalidInput("Please complete the CAPTCHA".to_string()))?;

    if is_denylisted(&identity.user_agent, &state.config.bot_denylist) {
        tracing::info!(ip = %identity.ip_address, user_agent = %identity.user_agent, "Denylisted user agent");
        return Err(GateError::Forbidden("Automated clients are not allowed".to_string()));
    }

    state.csrf.validate(csrf_token, &identity.ip_address).await?;

    if let Err(e) = state.verify_throttle.check_and_record(identity).await?.into_result() {
        GatewayStats::bump(&state.stats.throttled);
        return Err(e);
    }

    let remote_ip = (identity.ip_address != UNKNOWN).then_some(identity.ip_address.as_str());
    match state.verifier.verify(captcha_response, remote_ip).await {
        Ok(_) => {}
        Err(e @ GateError::Upstream(_)) => {
            GatewayStats::bump(&state.stats.upstream_errors);
            tracing::error!(ip = %identity.ip_address, error = %e, "siteverify call failed");
            if let Err(release_err) = state.verify_throttle.release(identity).await {
                tracing::warn!(error = %release_err, "Failed to release throttle attempt");
            }
            return Err(e);
        }
        Err(e) => {
            GatewayStats::bump(&state.stats.verify_rejected);
            tracing::info!(ip = %identity.ip_address, fingerprint = %identity.fingerprint, reason = %e, "CAPTCHA rejected");
            return Err(e);
        }
    }

    if state.verify_throttle.policy().block_on_success {
        state.verify_throttle.mark_blocked(identity).await?;
    }

    let grant = state.grants.issue(&identity.ip_address).await?;
    GatewayStats::bump(&state.stats.verify_passed);

    tracing::info!(
        ip = %identity.ip_address,
        fingerprint = %identity.fingerprint,
        "CAPTCHA verified successfully"
    );

    let redirect = (!state.config.redirect.defer).then_some(grant.destination_url);
    Ok(GateResponse::ok("CAPTCHA verified successfully").with_redirect(redirect))
}

/// Case-insensitive substring match against the denylist
pub fn is_denylisted(user_agent: &str, denylist: &[String]) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    denylist
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| ua.contains(&needle.to_ascii_lowercase()))
}
