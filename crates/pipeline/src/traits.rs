//! Collaborator traits for the external dependencies the pipeline consumes
//! (RF-42).
//!
//! Production implementations live in `reelforge-provider` (video provider)
//! and the surrounding application (scraper, script generator, object
//! storage, scorer); tests supply scripted doubles. The persistence store
//! traits live in `reelforge_db::stores`.

use async_trait::async_trait;

use reelforge_core::quality::QualityReport;
use reelforge_core::selection::Style;
use reelforge_core::types::DbId;
use reelforge_db::models::generation_job::GenerationJob;
use reelforge_provider::api::{DispatchRequest, VideoApi};
use reelforge_provider::wire::TaskStatus;

/// Failure of a collaborator call. Carries only the human-readable reason;
/// the taxonomy slot is supplied by the caller.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DependencyError(pub String);

// ---------------------------------------------------------------------------
// Video provider
// ---------------------------------------------------------------------------

/// The video-generation provider: dispatch plus status polling.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Dispatch a task; returns the provider task handle.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<String, DependencyError>;

    /// Poll a dispatched task's status, normalized across wire revisions.
    async fn poll_status(&self, task_handle: &str) -> Result<TaskStatus, DependencyError>;
}

#[async_trait]
impl VideoProvider for VideoApi {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<String, DependencyError> {
        VideoApi::dispatch(self, request)
            .await
            .map_err(|e| DependencyError(e.to_string()))
    }

    async fn poll_status(&self, task_handle: &str) -> Result<TaskStatus, DependencyError> {
        VideoApi::poll_status(self, task_handle)
            .await
            .map_err(|e| DependencyError(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Content source (scraper)
// ---------------------------------------------------------------------------

/// Scraped page content used to seed a batch item's script.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
}

/// Rate-limited content scraper, consumed only by the batch orchestrator.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageContent, DependencyError>;
}

// ---------------------------------------------------------------------------
// Script generator
// ---------------------------------------------------------------------------

/// Rate-limited script generator.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(
        &self,
        title: &str,
        description: &str,
        style: Style,
        duration_secs: u32,
    ) -> Result<String, DependencyError>;
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Platform object storage. Failures here are non-fatal: the pipeline
/// falls back to the provider's own (possibly transient) URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy a provider result into platform storage; returns the storage
    /// path.
    async fn store(
        &self,
        provider_result_url: &str,
        owner_id: DbId,
        job_id: DbId,
    ) -> Result<String, DependencyError>;

    /// Produce a temporary signed URL for a stored object.
    async fn sign(&self, storage_path: &str) -> Result<String, DependencyError>;
}

// ---------------------------------------------------------------------------
// Quality scorer
// ---------------------------------------------------------------------------

/// Scores a finished render for the quality gate.
#[async_trait]
pub trait QualityScorer: Send + Sync {
    async fn score(
        &self,
        job: &GenerationJob,
        result_url: &str,
    ) -> Result<QualityReport, DependencyError>;
}
