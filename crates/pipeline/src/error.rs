//! Pipeline error taxonomy (RF-41).
//!
//! Five externally-meaningful categories:
//!
//! - `Validation` — rejected before any ledger mutation; surfaced verbatim.
//! - `Dependency` — a collaborator call failed; recorded per item/job and
//!   always paired with a refund when a debit occurred.
//! - `BreakerOpen` — refunded like a dependency error, but logged as
//!   upstream-known-unhealthy so operators can tell a systemic outage from
//!   one-off failures.
//! - `Accounting` — a refund insert failed after a successful debit. The
//!   one category the system cannot self-heal; logged above ordinary
//!   errors with `accounting_defect = true` for alerting.
//!
//! Timeouts are dependency failures whose reason the system synthesizes
//! itself; they carry no variant of their own.

use std::time::Duration;

use reelforge_core::error::CoreError;
use reelforge_core::types::DbId;
use reelforge_db::stores::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: i64, available: i64 },

    #[error("{dependency} call failed: {reason}")]
    Dependency {
        dependency: &'static str,
        reason: String,
    },

    #[error("Video provider unavailable, retry after {retry_after:?}")]
    BreakerOpen { retry_after: Duration },

    #[error("Accounting defect on job {job_id}: {reason}")]
    Accounting { job_id: DbId, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}
