//! Cost calculation for generation requests (RF-13).
//!
//! Converts (backend, requested duration) into the dispatched duration,
//! the USD price, and the credit amount billed to the owner. Credits always
//! round up so the platform never under-charges fractional-cent provider
//! costs.

use crate::catalog::GenerationBackend;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Credit unit
// ---------------------------------------------------------------------------

/// USD value of a single credit.
pub const CREDIT_UNIT_USD: f64 = 0.005;

/// Credit unit expressed in 1/10,000-USD units.
const CREDIT_UNIT_TENTH_MILLS: i64 = 50;

/// Convert a USD amount into credits, rounding up.
///
/// Works in 1/10,000-USD integer units so the ceiling is exact despite f64
/// rounding noise in upstream multiplications.
pub fn usd_to_credits(usd: f64) -> i64 {
    let tenth_mills = (usd * 10_000.0).round() as i64;
    (tenth_mills + CREDIT_UNIT_TENTH_MILLS - 1) / CREDIT_UNIT_TENTH_MILLS
}

// ---------------------------------------------------------------------------
// Dispatch plan
// ---------------------------------------------------------------------------

/// The billable plan for a single provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPlan {
    /// Duration actually sent to the provider: `min(requested, backend max)`.
    pub dispatched_secs: u32,
    /// Price of the dispatched call in USD.
    pub usd: f64,
    /// Price of the dispatched call in credits (rounded up).
    pub credits: i64,
}

/// Compute the dispatch plan for a request against a backend.
///
/// A zero-duration request is rejected. A request exceeding the backend's
/// per-call maximum is capped, not multiplied: the saga dispatches and bills
/// exactly one call at the capped duration.
pub fn dispatch_plan(
    backend: &GenerationBackend,
    requested_secs: u32,
) -> Result<DispatchPlan, CoreError> {
    if requested_secs == 0 {
        return Err(CoreError::Validation(
            "Requested duration must be at least 1 second".to_string(),
        ));
    }
    let dispatched_secs = requested_secs.min(backend.max_duration_secs);
    let usd = backend.usd_per_second * dispatched_secs as f64;
    Ok(DispatchPlan {
        dispatched_secs,
        usd,
        credits: usd_to_credits(usd),
    })
}

// ---------------------------------------------------------------------------
// Chunked cost
// ---------------------------------------------------------------------------

/// Quote for rendering a duration longer than one call allows by chunking
/// into multiple provider calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkedCost {
    /// Number of provider calls needed: `ceil(requested / max)`.
    pub call_count: u32,
    /// Total USD across all calls. Each call is billed at the backend's
    /// full per-call maximum, not pro-rated.
    pub usd: f64,
    /// Total credits (rounded up).
    pub credits: i64,
}

/// Quote the cost of chunking `requested_secs` across multiple calls.
pub fn chunked_cost(
    backend: &GenerationBackend,
    requested_secs: u32,
) -> Result<ChunkedCost, CoreError> {
    if requested_secs == 0 {
        return Err(CoreError::Validation(
            "Requested duration must be at least 1 second".to_string(),
        ));
    }
    let max = backend.max_duration_secs;
    let call_count = requested_secs.div_ceil(max);
    let usd = backend.usd_per_second * max as f64 * call_count as f64;
    Ok(ChunkedCost {
        call_count,
        usd,
        credits: usd_to_credits(usd),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
