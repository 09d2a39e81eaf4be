//! Client stack for the external video-generation provider.
//!
//! - [`api`] — REST client for dispatch and status polling.
//! - [`wire`] — normalization of legacy and current response shapes into
//!   one internal result type.
//! - [`breaker`] — process-wide circuit breaker guarding dispatch calls.
//! - [`rate_limit`] — per-dependency request-rate ceilings.

pub mod api;
pub mod breaker;
pub mod rate_limit;
pub mod wire;
