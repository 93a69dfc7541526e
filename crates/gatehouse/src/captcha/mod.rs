//! CAPTCHA verification.
//!
//! - `verifier` - reCAPTCHA siteverify client
//! - `grant` - one-time redirect grants
//! - `orchestrator` - the full POST /verify flow

mod grant;
pub mod orchestrator;
mod verifier;

pub use grant::GrantLedger;
pub use orchestrator::VerifyRequest;
pub use verifier::CaptchaVerifier;
