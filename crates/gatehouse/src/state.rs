//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::captcha::{CaptchaVerifier, GrantLedger};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::csrf::CsrfVault;
use crate::identity::IdentityResolver;
use crate::stats::GatewayStats;
use crate::store::{MemoryStore, RedisStore, Store};
use crate::throttle::Throttle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Backing key-value store
    pub store: Store,

    pub resolver: IdentityResolver,

    /// Gates POST /verify
    pub verify_throttle: Arc<Throttle<Store>>,

    /// Flood limit for GET /check-rate-limit
    pub poll_throttle: Arc<Throttle<Store>>,

    /// Flood limit for CSRF token requests
    pub issuance_throttle: Arc<Throttle<Store>>,

    pub csrf: Arc<CsrfVault<Store>>,

    pub grants: Arc<GrantLedger<Store>>,

    /// reCAPTCHA siteverify client
    pub verifier: Arc<CaptchaVerifier>,

    pub stats: Arc<GatewayStats>,
}

impl AppState {
    /// Create application state, connecting to Redis when configured
    pub async fn new(config: AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = match config.redis_url.as_deref() {
            Some(url) => Store::Redis(RedisStore::connect(url).await?),
            None => Store::Memory(MemoryStore::new(clock.clone())),
        };

        Self::with_store(config, store, clock)
    }

    /// Wire services over an existing store and clock
    pub fn with_store(config: AppConfig, store: Store, clock: Arc<dyn Clock>) -> Result<Self> {
        let throttle = |name: &str, policy| {
            Arc::new(Throttle::new(name, policy, store.clone(), clock.clone()))
        };
        let verify_throttle = throttle("verify", config.throttle.verify_policy());
        let poll_throttle = throttle("poll", config.throttle.polling_policy());
        let issuance_throttle = throttle("issue", config.throttle.issuance_policy());

        let csrf = Arc::new(CsrfVault::new(
            store.clone(),
            clock.clone(),
            Duration::from_secs(config.csrf.ttl_secs),
            config.csrf.single_use,
        ));
        let grants = Arc::new(GrantLedger::new(
            store.clone(),
            clock.clone(),
            config.redirect.url.clone(),
            Duration::from_secs(config.redirect.grant_ttl_secs),
        ));
        let verifier = Arc::new(CaptchaVerifier::new(
            config.recaptcha.secret.clone(),
            config.recaptcha.verify_url.clone(),
            Duration::from_secs(config.recaptcha.timeout_secs),
            config.recaptcha.min_score,
        )?);

        Ok(Self {
            resolver: IdentityResolver::new(config.trust_forwarded_for, config.trusted_proxy_hops),
            config: Arc::new(config),
            store,
            verify_throttle,
            poll_throttle,
            issuance_throttle,
            csrf,
            grants,
            verifier,
            stats: Arc::new(GatewayStats::default()),
        })
    }
}
