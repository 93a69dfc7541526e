//! Shared constants for Gatehouse components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Google reCAPTCHA verification endpoint
pub const DEFAULT_SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Default upstream request timeout (seconds)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// CSRF token lifetime (1 minute)
pub const CSRF_TTL_SECS: u64 = 60;

/// Redirect grant lifetime (2 minutes)
pub const GRANT_TTL_SECS: u64 = 120;

/// Verification throttle window (5 minutes)
pub const VERIFY_WINDOW_SECS: u64 = 300;

/// Verification attempts allowed per window
pub const VERIFY_MAX_ATTEMPTS: u32 = 1;

/// Polling throttle window (1 minute)
pub const POLL_WINDOW_SECS: u64 = 60;

/// Polling calls allowed per window
pub const POLL_MAX_ATTEMPTS: u32 = 10;

/// Token issuance window (1 minute)
pub const ISSUANCE_WINDOW_SECS: u64 = 60;

/// Token requests allowed per window
pub const ISSUANCE_MAX_ATTEMPTS: u32 = 20;

/// Length of a synthesized fingerprint (hex chars)
pub const FINGERPRINT_LEN: usize = 32;

/// Upper bound on client-supplied fingerprints
pub const MAX_CLIENT_FINGERPRINT_LEN: usize = 128;

/// Placeholder for identity fields that could not be resolved
pub const UNKNOWN: &str = "unknown";

/// Default user-agent substrings treated as automated clients
pub const DEFAULT_BOT_DENYLIST: &[&str] = &["bot", "spider", "crawler", "scraper"];

/// Store key prefixes
pub mod store_keys {
    /// Throttle record: throttle:{policy}:{axis}:{id}
    pub const THROTTLE_PREFIX: &str = "throttle:";

    /// CSRF token: csrf:{token}
    pub const CSRF_PREFIX: &str = "csrf:";

    /// Redirect grant: grant:{ip}
    pub const GRANT_PREFIX: &str = "grant:";
}

/// HTTP header names
pub mod headers {
    /// Anti-forgery token header
    pub const X_CSRF_TOKEN: &str = "X-CSRF-Token";

    /// Proxy chain header
    pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

    /// Single client address set by some proxies
    pub const X_REAL_IP: &str = "X-Real-IP";
}
