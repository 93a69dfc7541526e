//! Common error types for Gatehouse components.

use thiserror::Error;

/// Errors surfaced at the gateway's request boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// Missing or malformed client input
    #[error("Client Error: {0}")]
    InvalidInput(String),

    /// Anti-forgery failure, denylisted client, or unverified session
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Throttle denied the attempt
    #[error("Rate limited: retry in {remaining_secs}s")]
    RateLimited { remaining_secs: u64 },

    /// Verifier answered, and the answer was no
    #[error("Verification rejected: {0}")]
    Rejected(String),

    /// Verifier unreachable or replied with garbage
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Key-value store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Forbidden(_) => 403,
            Self::RateLimited { .. } => 429,
            Self::Rejected(_) => 403,
            Self::Upstream(_) => 502,
            Self::Store(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Human-readable message shown to the client
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::Forbidden(msg) => msg.clone(),
            Self::RateLimited { .. } => "Too many attempts. Please try again later.".to_string(),
            Self::Rejected(_) => "CAPTCHA verification failed".to_string(),
            Self::Upstream(_) => "Error verifying CAPTCHA".to_string(),
            Self::Store(_) => "Service temporarily unavailable".to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Cooldown to report alongside the error, if any
    pub fn remaining_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { remaining_secs } => Some(*remaining_secs),
            _ => None,
        }
    }
}
