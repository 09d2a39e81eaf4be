//! Quality gate scoring and the regeneration decision (RF-15).
//!
//! A completed job is scored in `0.0..=1.0`; a score under the configured
//! threshold is a quality failure. A quality failure triggers exactly one
//! auto-regeneration when the owner has opted in, otherwise a refund.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default minimum acceptable quality score.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.7;

/// Default cap on auto-regenerations per original job.
pub const DEFAULT_MAX_AUTO_REGENERATIONS: i32 = 1;

// ---------------------------------------------------------------------------
// Issue tags
// ---------------------------------------------------------------------------

/// Visible artifacts or warping in the render.
pub const ISSUE_ARTIFACTS: &str = "artifacts";
/// Hands or fingers rendered implausibly.
pub const ISSUE_MALFORMED_HANDS: &str = "malformed_hands";
/// On-screen text illegible or garbled.
pub const ISSUE_ILLEGIBLE_TEXT: &str = "illegible_text";
/// Output noticeably shorter than the dispatched duration.
pub const ISSUE_TRUNCATED: &str = "truncated";
/// Output resolution below the requested profile.
pub const ISSUE_LOW_RESOLUTION: &str = "low_resolution";

// ---------------------------------------------------------------------------
// Report & verdict
// ---------------------------------------------------------------------------

/// Score and issue list produced by the quality scorer for one result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Composite score in `0.0..=1.0`, higher is better.
    pub score: f64,
    /// Issue tags explaining a depressed score (see `ISSUE_*`).
    pub issues: Vec<String>,
}

/// Outcome of evaluating a report against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    Pass,
    Fail,
}

/// Evaluate a score against the threshold. Scores at the threshold pass.
pub fn evaluate(score: f64, threshold: f64) -> QualityVerdict {
    if score >= threshold {
        QualityVerdict::Pass
    } else {
        QualityVerdict::Fail
    }
}

/// Validate a configured quality threshold.
pub fn validate_threshold(threshold: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CoreError::Validation(format!(
            "Quality threshold must be between 0.0 and 1.0, got {threshold}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Regeneration decision
// ---------------------------------------------------------------------------

/// What to do with a quality-failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenDecision {
    /// Re-run selection at the highest quality tier and submit a new
    /// linked job.
    Regenerate,
    /// No regeneration available: refund and fail the job.
    Refund,
}

/// Decide between regeneration and refund for a quality failure.
///
/// Regeneration requires the owner's opt-in and an attempt count still
/// under the cap. Everything else refunds.
pub fn regeneration_decision(
    auto_regen_opt_in: bool,
    regeneration_count: i32,
    max_regenerations: i32,
) -> RegenDecision {
    if auto_regen_opt_in && regeneration_count < max_regenerations {
        RegenDecision::Regenerate
    } else {
        RegenDecision::Refund
    }
}

/// Human-readable failure reason for a quality failure, surfaced to the
/// owning user together with the score and issues.
pub fn quality_failure_reason(report: &QualityReport, threshold: f64) -> String {
    if report.issues.is_empty() {
        format!(
            "Quality check failed: score {:.2} below threshold {:.2}",
            report.score, threshold
        )
    } else {
        format!(
            "Quality check failed: score {:.2} below threshold {:.2} ({})",
            report.score,
            threshold,
            report.issues.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
