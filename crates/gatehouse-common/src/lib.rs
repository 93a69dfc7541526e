//! # Gatehouse Common
//!
//! Shared types, traits, and utilities used across Gatehouse components.
//!
//! ## Modules
//! - `types` - Core data structures (ClientIdentity, GateResponse, etc.)
//! - `error` - Common error type
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::GateError;
pub use types::*;
