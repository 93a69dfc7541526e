//! Configuration management for Gatehouse.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::throttle::BlockPolicy;
use gatehouse_common::Axis;
use gatehouse_common::constants::{
    CSRF_TTL_SECS, DEFAULT_BOT_DENYLIST, DEFAULT_LISTEN_ADDR, DEFAULT_SITEVERIFY_URL,
    DEFAULT_UPSTREAM_TIMEOUT_SECS, GRANT_TTL_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Redis connection URL; in-memory store when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Take the client IP from X-Forwarded-For / X-Real-IP. Only enable
    /// behind a proxy that rewrites these headers.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Proxies in front of the gateway, each appending one X-Forwarded-For hop
    #[serde(default = "default_trusted_hops")]
    pub trusted_proxy_hops: usize,

    /// Bearer token for /admin; admin routes are off when unset
    #[serde(default)]
    pub admin_token: Option<String>,

    /// User-agent substrings rejected before verification
    #[serde(default = "default_bot_denylist")]
    pub bot_denylist: Vec<String>,

    #[serde(default)]
    pub recaptcha: RecaptchaConfig,

    #[serde(default)]
    pub redirect: RedirectConfig,

    #[serde(default)]
    pub csrf: CsrfConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,
}

/// Upstream verifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecaptchaConfig {
    /// Site secret shared with Google
    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_verify_url")]
    pub verify_url: String,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Minimum v3 score; ignored for v2 replies
    #[serde(default)]
    pub min_score: Option<f64>,
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            verify_url: default_verify_url(),
            timeout_secs: default_upstream_timeout(),
            min_score: None,
        }
    }
}

/// Protected destination
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectConfig {
    #[serde(default)]
    pub url: String,

    /// Only disclose the URL through /get-redirect
    #[serde(default)]
    pub defer: bool,

    #[serde(default = "default_grant_ttl")]
    pub grant_ttl_secs: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            defer: false,
            grant_ttl_secs: default_grant_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    #[serde(default = "default_csrf_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_true")]
    pub single_use: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_csrf_ttl(),
            single_use: true,
        }
    }
}

/// Throttle policies; each table overrides its preset field by field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default)]
    pub verify: PolicyOverrides,

    #[serde(default)]
    pub polling: PolicyOverrides,

    #[serde(default)]
    pub issuance: PolicyOverrides,

    /// How often the in-memory store drops expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyOverrides {
    pub window_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub primary: Option<Axis>,
    pub cross_axis: Option<bool>,
    pub transitive: Option<bool>,
    pub block_on_success: Option<bool>,
    pub deny_fingerprint_change: Option<bool>,
}

impl PolicyOverrides {
    pub fn apply(&self, base: BlockPolicy) -> BlockPolicy {
        BlockPolicy {
            window: self.window_secs.map(Duration::from_secs).unwrap_or(base.window),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            primary: self.primary.unwrap_or(base.primary),
            cross_axis: self.cross_axis.unwrap_or(base.cross_axis),
            transitive: self.transitive.unwrap_or(base.transitive),
            block_on_success: self.block_on_success.unwrap_or(base.block_on_success),
            deny_fingerprint_change: self
                .deny_fingerprint_change
                .unwrap_or(base.deny_fingerprint_change),
        }
    }
}

impl ThrottleConfig {
    pub fn verify_policy(&self) -> BlockPolicy {
        self.verify.apply(BlockPolicy::verification())
    }

    pub fn polling_policy(&self) -> BlockPolicy {
        self.polling.apply(BlockPolicy::polling())
    }

    pub fn issuance_policy(&self) -> BlockPolicy {
        self.issuance.apply(BlockPolicy::issuance())
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_true() -> bool { true }
fn default_trusted_hops() -> usize { 1 }
fn default_bot_denylist() -> Vec<String> { DEFAULT_BOT_DENYLIST.iter().map(|s| s.to_string()).collect() }
fn default_verify_url() -> String { DEFAULT_SITEVERIFY_URL.to_string() }
fn default_upstream_timeout() -> u64 { DEFAULT_UPSTREAM_TIMEOUT_SECS }
fn default_grant_ttl() -> u64 { GRANT_TTL_SECS }
fn default_csrf_ttl() -> u64 { CSRF_TTL_SECS }
fn default_sweep_interval() -> u64 { 30 }

impl AppConfig {
    /// Load configuration from file and environment, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("GATEHOUSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load config")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        config.apply_args(args);
        Ok(config)
    }

    fn apply_args(&mut self, args: &super::Args) {
        if let Some(ref redis_url) = args.redis_url {
            self.redis_url = Some(redis_url.clone());
        }
        if let Some(ref listen) = args.listen {
            self.listen_addr = listen.clone();
        }
        if let Some(port) = args.port {
            self.listen_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(ref secret) = args.secret {
            self.recaptcha.secret = secret.clone();
        }
        if let Some(ref url) = args.redirect_url {
            self.redirect.url = url.clone();
        }
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.recaptcha.secret.trim().is_empty() {
            bail!("reCAPTCHA secret is not set (RECAPTCHA_SECRET)");
        }
        if self.redirect.url.trim().is_empty() {
            bail!("redirect destination is not set (REDIRECT_URL)");
        }
        for (name, policy) in [
            ("verify", self.throttle.verify_policy()),
            ("polling", self.throttle.polling_policy()),
            ("issuance", self.throttle.issuance_policy()),
        ] {
            if policy.window.is_zero() {
                bail!("throttle.{} window must be positive", name);
            }
            if policy.max_attempts == 0 {
                bail!("throttle.{} max_attempts must be positive", name);
            }
        }
        if self.csrf.ttl_secs == 0 || self.redirect.grant_ttl_secs == 0 {
            bail!("csrf.ttl_secs and redirect.grant_ttl_secs must be positive");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            redis_url: None,
            trust_forwarded_for: false,
            trusted_proxy_hops: default_trusted_hops(),
            admin_token: None,
            bot_denylist: default_bot_denylist(),
            recaptcha: RecaptchaConfig::default(),
            redirect: RedirectConfig::default(),
            csrf: CsrfConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> crate::Args {
        crate::Args {
            config: "does/not/exist.toml".to_string(),
            redis_url: None,
            listen: None,
            port: None,
            secret: None,
            redirect_url: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    #[test]
    fn test_defaults_fail_validation_without_secret() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = crate::Args {
            port: Some(8080),
            secret: Some("s3cret".to_string()),
            redirect_url: Some("https://www.example.com/success".to_string()),
            ..args()
        };

        config.apply_args(&args);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.recaptcha.secret, "s3cret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_overrides_keep_preset_fields() {
        let overrides = PolicyOverrides {
            max_attempts: Some(3),
            transitive: Some(true),
            ..Default::default()
        };

        let policy = overrides.apply(BlockPolicy::verification());
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.transitive);
        assert_eq!(policy.window, Duration::from_secs(300));
        assert!(policy.block_on_success);
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = AppConfig::default();
        config.recaptcha.secret = "s".to_string();
        config.redirect.url = "https://example.com".to_string();
        config.throttle.polling.window_secs = Some(0);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_table_from_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [recaptcha]
                secret = "abc"

                [throttle.verify]
                window_secs = 600
                block_on_success = false
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: AppConfig = settings.try_deserialize().unwrap();
        let policy = config.throttle.verify_policy();
        assert_eq!(policy.window, Duration::from_secs(600));
        assert!(!policy.block_on_success);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(config.csrf.ttl_secs, 60);
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.trusted_proxy_hops, 1);
    }
}
