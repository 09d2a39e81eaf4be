//! Batch job and batch item models (RF-33).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use reelforge_core::lifecycle::StatusId;
use reelforge_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A row from the `batch_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchJob {
    pub id: DbId,
    pub owner_id: DbId,
    pub status_id: StatusId,
    pub item_count: i32,
    /// Credits quoted for the whole batch at submission time.
    pub reserved_credits: i64,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `batch_items` table. Owns at most one generation job,
/// created lazily at dispatch.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchItem {
    pub id: DbId,
    pub batch_id: DbId,
    pub source_url: String,
    pub style: String,
    pub duration_secs: i32,
    pub status_id: StatusId,
    pub job_id: Option<DbId>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// One item of a batch submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatchItem {
    pub source_url: String,
    pub style: String,
    pub duration_secs: i32,
}

/// Input for creating a batch with its items.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub owner_id: DbId,
    pub reserved_credits: i64,
    pub items: Vec<NewBatchItem>,
}
