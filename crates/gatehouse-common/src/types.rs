//! Core types shared across Gatehouse components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GateError;

/// One of the two identity axes a throttle can key on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Client IP address
    Ip,
    /// Device fingerprint
    Fingerprint,
}

impl Axis {
    /// The opposite axis
    pub fn other(&self) -> Self {
        match self {
            Self::Ip => Self::Fingerprint,
            Self::Fingerprint => Self::Ip,
        }
    }

    /// Short tag used in store keys and admin paths
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Fingerprint => "fp",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ip" => Some(Self::Ip),
            "fp" | "fingerprint" => Some(Self::Fingerprint),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-request client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub ip_address: String,
    pub fingerprint: String,
    pub user_agent: String,
}

impl ClientIdentity {
    pub fn new(
        ip_address: impl Into<String>,
        fingerprint: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            ip_address: ip_address.into(),
            fingerprint: fingerprint.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Identifier on the given axis
    pub fn on(&self, axis: Axis) -> &str {
        match axis {
            Axis::Ip => &self.ip_address,
            Axis::Fingerprint => &self.fingerprint,
        }
    }
}

/// Device descriptor optionally sent by the browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub screen_resolution: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Client-computed fingerprint hash
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Anti-forgery token handed to the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    /// IP address the token was issued to
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

/// Destination released after a verified, rate-limit-cleared request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectGrant {
    pub destination_url: String,
    pub issued_at: DateTime<Utc>,
}

/// Structured reply for every client-facing endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl GateResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            status: Some(200),
            ..Default::default()
        }
    }

    pub fn with_redirect(mut self, url: Option<String>) -> Self {
        self.redirect_url = url;
        self
    }

    pub fn with_csrf_token(mut self, token: String) -> Self {
        self.csrf_token = Some(token);
        self
    }
}

impl From<&GateError> for GateResponse {
    fn from(err: &GateError) -> Self {
        Self {
            success: false,
            message: err.public_message(),
            debug: Some(err.to_string()),
            status: Some(err.status_code()),
            remaining_time: err.remaining_secs(),
            ..Default::default()
        }
    }
}

/// Metrics snapshot for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// CSRF tokens handed out
    pub tokens_issued: u64,

    /// Verification requests received
    pub verify_requests: u64,

    /// Verifications that produced a redirect grant
    pub verify_passed: u64,

    /// Verifications rejected by the upstream verifier
    pub verify_rejected: u64,

    /// Requests denied by a throttle
    pub throttled: u64,

    /// Upstream transport or decoding failures
    pub upstream_errors: u64,

    /// Redirect grants claimed
    pub grants_claimed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_tags() {
        assert_eq!(Axis::from_tag("ip"), Some(Axis::Ip));
        assert_eq!(Axis::from_tag("fp"), Some(Axis::Fingerprint));
        assert_eq!(Axis::from_tag("mac"), None);
        assert_eq!(Axis::Ip.other(), Axis::Fingerprint);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = GateResponse::from(&GateError::RateLimited { remaining_secs: 42 });
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 429);
        assert_eq!(json["remainingTime"], 42);
        assert!(json.get("redirectUrl").is_none());
    }

    #[test]
    fn test_success_has_no_debug() {
        let resp = GateResponse::ok("done").with_redirect(Some("https://example.com".into()));
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["redirectUrl"], "https://example.com");
        assert!(json.get("debug").is_none());
    }
}
