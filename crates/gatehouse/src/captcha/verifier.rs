//! Client for the reCAPTCHA `siteverify` endpoint.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use gatehouse_common::GateError;

/// Reply from `siteverify`
#[derive(Debug, Clone, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    /// Present for v3 keys
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

/// Verifies CAPTCHA responses with the upstream service
pub struct CaptchaVerifier {
    http: reqwest::Client,
    secret: String,
    verify_url: String,
    min_score: Option<f64>,
}

impl CaptchaVerifier {
    pub fn new(
        secret: String,
        verify_url: String,
        timeout: Duration,
        min_score: Option<f64>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            secret,
            verify_url,
            min_score,
        })
    }

    /// Ask the upstream whether `response` is a solved CAPTCHA.
    ///
    /// `Err(Upstream)` means we never got a usable answer; `Err(Rejected)`
    /// means the upstream said no.
    pub async fn verify(&self, response: &str, remote_ip: Option<&str>) -> Result<SiteVerifyResponse, GateError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", response)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let reply = self
            .http
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GateError::Upstream(e.to_string()))?;

        let result: SiteVerifyResponse = reply
            .json()
            .await
            .map_err(|e| GateError::Upstream(format!("undecodable siteverify reply: {}", e)))?;

        if !result.success {
            let codes = if result.error_codes.is_empty() {
                "none".to_string()
            } else {
                result.error_codes.join(", ")
            };
            return Err(GateError::Rejected(format!("error-codes: {}", codes)));
        }

        if let (Some(min), Some(score)) = (self.min_score, result.score) {
            if score < min {
                return Err(GateError::Rejected(format!("score {:.2} below {:.2}", score, min)));
            }
        }

        tracing::debug!(
            score = ?result.score,
            hostname = ?result.hostname,
            "siteverify accepted response"
        );

        Ok(result)
    }
}
