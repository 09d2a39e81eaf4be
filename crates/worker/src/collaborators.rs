//! Worker-side implementations of the storage and scoring collaborators.
//!
//! Object storage here is a mounted volume: results are downloaded from
//! the provider CDN into `RESULT_STORAGE_ROOT`. Scoring is a cheap size
//! sanity check; richer scorers plug in through the same trait.

use std::path::PathBuf;

use async_trait::async_trait;

use reelforge_core::quality::{QualityReport, ISSUE_TRUNCATED};
use reelforge_core::types::DbId;
use reelforge_db::models::generation_job::GenerationJob;
use reelforge_pipeline::traits::{DependencyError, ObjectStore, QualityScorer};

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Stores provider results on a local volume under
/// `{root}/{owner_id}/{job_id}.mp4`.
pub struct LocalObjectStore {
    client: reqwest::Client,
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            root,
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn store(
        &self,
        provider_result_url: &str,
        owner_id: DbId,
        job_id: DbId,
    ) -> Result<String, DependencyError> {
        let response = self
            .client
            .get(provider_result_url)
            .send()
            .await
            .map_err(|e| DependencyError(format!("Result download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(DependencyError(format!(
                "Result download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DependencyError(format!("Result download failed: {e}")))?;

        let dir = self.root.join(owner_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DependencyError(format!("Storage directory create failed: {e}")))?;
        let path = dir.join(format!("{job_id}.mp4"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DependencyError(format!("Storage write failed: {e}")))?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn sign(&self, storage_path: &str) -> Result<String, DependencyError> {
        // Local volume: the path doubles as the (non-expiring) URL.
        Ok(format!("file://{storage_path}"))
    }
}

// ---------------------------------------------------------------------------
// Quality scoring
// ---------------------------------------------------------------------------

/// Minimum plausible bytes per rendered second. Renders far below this are
/// flagged as truncated.
const MIN_BYTES_PER_SECOND: u64 = 40_000;

/// Scores a render by checking its reported size against the dispatched
/// duration. A missing or implausibly small payload scores low with a
/// `truncated` issue; everything else passes.
pub struct SizeHeuristicScorer {
    client: reqwest::Client,
}

impl SizeHeuristicScorer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SizeHeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityScorer for SizeHeuristicScorer {
    async fn score(
        &self,
        job: &GenerationJob,
        result_url: &str,
    ) -> Result<QualityReport, DependencyError> {
        let response = self
            .client
            .head(result_url)
            .send()
            .await
            .map_err(|e| DependencyError(format!("Result probe failed: {e}")))?;
        if !response.status().is_success() {
            return Err(DependencyError(format!(
                "Result probe returned {}",
                response.status()
            )));
        }

        let expected = job.dispatched_duration_secs as u64 * MIN_BYTES_PER_SECOND;
        let actual = response.content_length().unwrap_or(0);

        if actual >= expected {
            Ok(QualityReport {
                score: 1.0,
                issues: vec![],
            })
        } else {
            // Scale the score by how much of the expected payload arrived.
            let ratio = if expected == 0 {
                0.0
            } else {
                actual as f64 / expected as f64
            };
            Ok(QualityReport {
                score: ratio.clamp(0.0, 0.6),
                issues: vec![ISSUE_TRUNCATED.to_string()],
            })
        }
    }
}
