//! Generation job models and DTOs (RF-31).
//!
//! A generation job is the durable unit of work: created when a user (or
//! batch item) requests generation, mutated by the completion poller, and
//! never deleted once it has a ledger entry — only status-terminal.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use reelforge_core::lifecycle::StatusId;
use reelforge_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub owner_id: DbId,
    pub status_id: StatusId,
    /// Catalog backend id, referenced by slug rather than ownership.
    pub backend_id: String,
    pub style: String,
    pub script: String,
    /// JSON array of reference image URLs. Retained so a regeneration can
    /// re-dispatch without the original request context.
    pub image_urls: serde_json::Value,
    pub aspect_ratio: String,
    pub requested_duration_secs: i32,
    pub dispatched_duration_secs: i32,
    pub cost_credits: i64,
    pub cost_usd: f64,
    pub risk_level: String,
    pub quality_tier: String,
    /// Owner's auto-regeneration opt-in, snapshotted at submission.
    pub auto_regenerate: bool,
    /// Null until provider dispatch succeeds.
    pub provider_task_handle: Option<String>,
    /// Null until the provider reports completion.
    pub result_url: Option<String>,
    /// Platform storage path; null when storage failed and the provider
    /// URL is the only copy.
    pub storage_path: Option<String>,
    pub failure_reason: Option<String>,
    pub quality_score: Option<f64>,
    pub quality_issues: Option<serde_json::Value>,
    /// How many regenerations preceded this job in its chain. Zero for an
    /// original submission.
    pub regeneration_count: i32,
    /// The quality-failed job this one supersedes, if any.
    pub regenerated_from_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl GenerationJob {
    /// Whether this job is itself a regeneration attempt.
    pub fn is_regeneration(&self) -> bool {
        self.regenerated_from_job_id.is_some()
    }

    /// The reference image URLs as a string vector.
    pub fn image_urls_vec(&self) -> Vec<String> {
        self.image_urls
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new generation job in `processing` state. The full
/// selection metadata is recorded up front so the row is a usable audit
/// trail even when later saga steps fail.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGenerationJob {
    pub owner_id: DbId,
    pub backend_id: String,
    pub style: String,
    pub script: String,
    pub image_urls: serde_json::Value,
    pub aspect_ratio: String,
    pub requested_duration_secs: i32,
    pub dispatched_duration_secs: i32,
    pub cost_credits: i64,
    pub cost_usd: f64,
    pub risk_level: String,
    pub quality_tier: String,
    pub auto_regenerate: bool,
    pub regeneration_count: i32,
    pub regenerated_from_job_id: Option<DbId>,
}
