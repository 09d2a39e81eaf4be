//! In-memory collaborator doubles for pipeline behavioral tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reelforge_core::catalog::Catalog;
use reelforge_core::ledger::EntryKind;
use reelforge_core::lifecycle::{BatchStatus, ItemStatus, JobStatus};
use reelforge_core::quality::QualityReport;
use reelforge_core::selection::{QualityTier, Style};
use reelforge_core::types::{DbId, Timestamp};
use reelforge_db::models::batch::{BatchItem, BatchJob, NewBatch};
use reelforge_db::models::generation_job::{GenerationJob, NewGenerationJob};
use reelforge_db::models::ledger_entry::LedgerEntry;
use reelforge_db::stores::{BatchStore, JobStore, LedgerStore, StoreError};
use reelforge_pipeline::batch::BatchOrchestrator;
use reelforge_pipeline::completion::CompletionPoller;
use reelforge_pipeline::config::PipelineConfig;
use reelforge_pipeline::saga::{GenerationSaga, SubmitRequest};
use reelforge_pipeline::traits::{
    ContentSource, DependencyError, ObjectStore, PageContent, QualityScorer, ScriptGenerator,
    VideoProvider,
};
use reelforge_provider::api::DispatchRequest;
use reelforge_provider::breaker::{BreakerConfig, CircuitBreaker};
use reelforge_provider::rate_limit::{DependencyLimiters, RateLimitConfig};
use reelforge_provider::wire::TaskStatus;

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    next_id: i64,
    jobs: HashMap<DbId, GenerationJob>,
    entries: Vec<LedgerEntry>,
    batches: HashMap<DbId, BatchJob>,
    items: HashMap<DbId, BatchItem>,
}

impl StoreInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn balance(&self, owner_id: DbId) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.amount_credits)
            .sum()
    }
}

/// In-memory implementation of all three store traits. The mutex is held
/// across every check-then-write, so the debit path has the same atomicity
/// the Postgres advisory lock provides.
#[derive(Default)]
pub struct MemStores {
    inner: Mutex<StoreInner>,
    fail_next_credit: AtomicBool,
}

impl MemStores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an owner's balance with a purchase entry.
    pub fn grant(&self, owner_id: DbId, credits: i64) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.entries.push(LedgerEntry {
            id,
            owner_id,
            amount_credits: credits,
            kind: EntryKind::Purchase.as_str().to_string(),
            job_id: None,
            created_at: chrono::Utc::now(),
        });
    }

    pub fn balance_of(&self, owner_id: DbId) -> i64 {
        self.inner.lock().unwrap().balance(owner_id)
    }

    pub fn job(&self, job_id: DbId) -> GenerationJob {
        self.inner.lock().unwrap().jobs[&job_id].clone()
    }

    pub fn all_jobs(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<_> = self.inner.lock().unwrap().jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    pub fn job_count(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }

    /// Signed amounts of the entries linked to a job.
    pub fn job_entry_amounts(&self, job_id: DbId) -> Vec<i64> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.job_id == Some(job_id))
            .map(|e| e.amount_credits)
            .collect()
    }

    pub fn item(&self, item_id: DbId) -> BatchItem {
        self.inner.lock().unwrap().items[&item_id].clone()
    }

    pub fn batch_items_of(&self, batch_id: DbId) -> Vec<BatchItem> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<_> = inner
            .items
            .values()
            .filter(|i| i.batch_id == batch_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        items
    }

    pub fn batch(&self, batch_id: DbId) -> BatchJob {
        self.inner.lock().unwrap().batches[&batch_id].clone()
    }

    pub fn set_job_created_at(&self, job_id: DbId, created_at: Timestamp) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.get_mut(&job_id).unwrap().created_at = created_at;
    }

    /// Make the next `credit` call fail, simulating a ledger outage at
    /// refund time.
    pub fn fail_next_credit(&self) {
        self.fail_next_credit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobStore for MemStores {
    async fn create_job(&self, input: &NewGenerationJob) -> Result<GenerationJob, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let now = chrono::Utc::now();
        let job = GenerationJob {
            id,
            owner_id: input.owner_id,
            status_id: JobStatus::Processing.id(),
            backend_id: input.backend_id.clone(),
            style: input.style.clone(),
            script: input.script.clone(),
            image_urls: input.image_urls.clone(),
            aspect_ratio: input.aspect_ratio.clone(),
            requested_duration_secs: input.requested_duration_secs,
            dispatched_duration_secs: input.dispatched_duration_secs,
            cost_credits: input.cost_credits,
            cost_usd: input.cost_usd,
            risk_level: input.risk_level.clone(),
            quality_tier: input.quality_tier.clone(),
            auto_regenerate: input.auto_regenerate,
            provider_task_handle: None,
            result_url: None,
            storage_path: None,
            failure_reason: None,
            quality_score: None,
            quality_issues: None,
            regeneration_count: input.regeneration_count,
            regenerated_from_job_id: input.regenerated_from_job_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        inner.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn delete_job(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.remove(&id).ok_or(StoreError::NotFound {
            entity: "generation_job",
            id,
        })?;
        Ok(())
    }

    async fn find_job(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.inner.lock().unwrap().jobs.get(&id).cloned())
    }

    async fn set_task_handle(&self, id: DbId, task_handle: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "generation_job",
            id,
        })?;
        job.provider_task_handle = Some(task_handle.to_string());
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: DbId,
        result_url: &str,
        storage_path: Option<&str>,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(&id).unwrap();
        job.status_id = JobStatus::Completed.id();
        job.result_url = Some(result_url.to_string());
        job.storage_path = storage_path.map(str::to_string);
        job.quality_score = Some(quality_score);
        job.quality_issues = Some(serde_json::json!(quality_issues));
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: DbId,
        reason: &str,
        quality: Option<(f64, Vec<String>)>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(&id).unwrap();
        job.status_id = JobStatus::Failed.id();
        job.failure_reason = Some(reason.to_string());
        if let Some((score, issues)) = quality {
            job.quality_score = Some(score);
            job.quality_issues = Some(serde_json::json!(issues));
        }
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_superseded(
        &self,
        id: DbId,
        reason: &str,
        quality_score: f64,
        quality_issues: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(&id).unwrap();
        job.status_id = JobStatus::Superseded.id();
        job.failure_reason = Some(reason.to_string());
        job.quality_score = Some(quality_score);
        job.quality_issues = Some(serde_json::json!(quality_issues));
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn list_processing(&self) -> Result<Vec<GenerationJob>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<_> = inner
            .jobs
            .values()
            .filter(|j| j.status_id == JobStatus::Processing.id())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

#[async_trait]
impl LedgerStore for MemStores {
    async fn balance(&self, owner_id: DbId) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().balance(owner_id))
    }

    async fn debit(
        &self,
        owner_id: DbId,
        credits: i64,
        job_id: DbId,
    ) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.balance(owner_id);
        if available < credits {
            return Err(StoreError::InsufficientBalance {
                needed: credits,
                available,
            });
        }
        let id = inner.next_id();
        let entry = LedgerEntry {
            id,
            owner_id,
            amount_credits: -credits,
            kind: EntryKind::GenerationDebit.as_str().to_string(),
            job_id: Some(job_id),
            created_at: chrono::Utc::now(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn credit(
        &self,
        owner_id: DbId,
        credits: i64,
        kind: EntryKind,
        job_id: Option<DbId>,
    ) -> Result<LedgerEntry, StoreError> {
        if self.fail_next_credit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict("simulated ledger outage".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let entry = LedgerEntry {
            id,
            owner_id,
            amount_credits: credits,
            kind: kind.as_str().to_string(),
            job_id,
            created_at: chrono::Utc::now(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn entries_for_job(&self, job_id: DbId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.job_id == Some(job_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BatchStore for MemStores {
    async fn create_batch(
        &self,
        input: &NewBatch,
    ) -> Result<(BatchJob, Vec<BatchItem>), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = chrono::Utc::now();
        let batch_id = inner.next_id();
        let batch = BatchJob {
            id: batch_id,
            owner_id: input.owner_id,
            status_id: BatchStatus::Pending.id(),
            item_count: input.items.len() as i32,
            reserved_credits: input.reserved_credits,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        inner.batches.insert(batch_id, batch.clone());

        let mut items = Vec::with_capacity(input.items.len());
        for new_item in &input.items {
            let item_id = inner.next_id();
            let item = BatchItem {
                id: item_id,
                batch_id,
                source_url: new_item.source_url.clone(),
                style: new_item.style.clone(),
                duration_secs: new_item.duration_secs,
                status_id: ItemStatus::Pending.id(),
                job_id: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            inner.items.insert(item_id, item.clone());
            items.push(item);
        }
        Ok((batch, items))
    }

    async fn mark_batch_running(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.batches.get_mut(&id).unwrap().status_id = BatchStatus::Running.id();
        Ok(())
    }

    async fn finalize_batch(
        &self,
        id: DbId,
        status: BatchStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let batch = inner.batches.get_mut(&id).unwrap();
        batch.status_id = status.id();
        batch.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn mark_item_processing(&self, item_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.get_mut(&item_id).unwrap().status_id = ItemStatus::Processing.id();
        Ok(())
    }

    async fn set_item_job(&self, item_id: DbId, job_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.get_mut(&item_id).unwrap().job_id = Some(job_id);
        Ok(())
    }

    async fn mark_item_completed(&self, item_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.get_mut(&item_id).unwrap().status_id = ItemStatus::Completed.id();
        Ok(())
    }

    async fn mark_item_failed(&self, item_id: DbId, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.get_mut(&item_id).unwrap();
        item.status_id = ItemStatus::Failed.id();
        item.error_message = Some(error.to_string());
        Ok(())
    }

    async fn delete_item_if_pending(&self, item_id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.get_mut(&item_id).ok_or(StoreError::NotFound {
            entity: "batch_item",
            id: item_id,
        })?;
        if item.status_id == ItemStatus::Pending.id() && item.job_id.is_none() {
            item.status_id = ItemStatus::Deleted.id();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_items(&self, batch_id: DbId) -> Result<Vec<BatchItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<_> = inner
            .items
            .values()
            .filter(|i| i.batch_id == batch_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

/// Marker substring: a dispatch whose script contains it fails.
pub const FAIL_DISPATCH_MARKER: &str = "fail-me";

/// Scripted provider double. Dispatches succeed with sequential handles
/// unless the script carries [`FAIL_DISPATCH_MARKER`]; polls answer from a
/// per-handle queue, defaulting to `Processing`.
#[derive(Default)]
pub struct FakeProvider {
    pub dispatch_count: AtomicUsize,
    next_handle: AtomicUsize,
    poll_results: Mutex<HashMap<String, VecDeque<TaskStatus>>>,
    pub dispatched: Mutex<Vec<DispatchRequest>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a poll answer for a task handle.
    pub fn push_poll(&self, handle: &str, status: TaskStatus) {
        self.poll_results
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_default()
            .push_back(status);
    }

    pub fn dispatches(&self) -> usize {
        self.dispatch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<String, DependencyError> {
        self.dispatch_count.fetch_add(1, Ordering::SeqCst);
        self.dispatched.lock().unwrap().push(request.clone());
        if request.script.contains(FAIL_DISPATCH_MARKER) {
            return Err(DependencyError("provider rejected the task".to_string()));
        }
        let n = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{n}"))
    }

    async fn poll_status(&self, task_handle: &str) -> Result<TaskStatus, DependencyError> {
        let mut polls = self.poll_results.lock().unwrap();
        Ok(polls
            .get_mut(task_handle)
            .and_then(VecDeque::pop_front)
            .unwrap_or(TaskStatus::Processing))
    }
}

// ---------------------------------------------------------------------------
// Fake scorer, storage, scraper, script generator
// ---------------------------------------------------------------------------

/// Scorer double: answers from a queue, defaulting to a perfect score.
#[derive(Default)]
pub struct FakeScorer {
    reports: Mutex<VecDeque<QualityReport>>,
}

impl FakeScorer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_report(&self, score: f64, issues: &[&str]) {
        self.reports.lock().unwrap().push_back(QualityReport {
            score,
            issues: issues.iter().map(|s| s.to_string()).collect(),
        });
    }
}

#[async_trait]
impl QualityScorer for FakeScorer {
    async fn score(
        &self,
        _job: &GenerationJob,
        _result_url: &str,
    ) -> Result<QualityReport, DependencyError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(QualityReport {
                score: 1.0,
                issues: vec![],
            }))
    }
}

/// Object-store double; flips to failure mode on demand.
#[derive(Default)]
pub struct FakeObjectStore {
    pub fail: AtomicBool,
}

impl FakeObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_stores(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn store(
        &self,
        _provider_result_url: &str,
        owner_id: DbId,
        job_id: DbId,
    ) -> Result<String, DependencyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DependencyError("storage unavailable".to_string()));
        }
        Ok(format!("owners/{owner_id}/jobs/{job_id}.mp4"))
    }

    async fn sign(&self, storage_path: &str) -> Result<String, DependencyError> {
        Ok(format!("https://cdn.platform.example/{storage_path}?sig=test"))
    }
}

/// Marker substring: a fetch of a URL containing it fails.
pub const FAIL_SCRAPE_MARKER: &str = "no-scrape";

#[derive(Default)]
pub struct FakeContentSource;

impl FakeContentSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl ContentSource for FakeContentSource {
    async fn fetch(&self, url: &str) -> Result<PageContent, DependencyError> {
        if url.contains(FAIL_SCRAPE_MARKER) {
            return Err(DependencyError("page fetch returned 403".to_string()));
        }
        Ok(PageContent {
            title: url.to_string(),
            description: "A product page".to_string(),
            images: vec![format!("{url}/hero.jpg")],
        })
    }
}

#[derive(Default)]
pub struct FakeScriptGenerator;

impl FakeScriptGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl ScriptGenerator for FakeScriptGenerator {
    async fn generate(
        &self,
        title: &str,
        _description: &str,
        _style: Style,
        _duration_secs: u32,
    ) -> Result<String, DependencyError> {
        // Echo the title so tests can steer the provider double per item.
        Ok(format!("A quick showcase of {title}"))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Fully wired pipeline over in-memory doubles.
pub struct Harness {
    pub stores: Arc<MemStores>,
    pub provider: Arc<FakeProvider>,
    pub scorer: Arc<FakeScorer>,
    pub object_store: Arc<FakeObjectStore>,
    pub breaker: Arc<CircuitBreaker>,
    pub saga: GenerationSaga,
    pub poller: CompletionPoller,
    pub orchestrator: BatchOrchestrator,
}

/// Test pipeline config: real policy values, millisecond pacing.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        item_stagger: std::time::Duration::from_millis(1),
        inter_window_delay: std::time::Duration::from_millis(1),
        ..PipelineConfig::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let stores = MemStores::new();
        let provider = FakeProvider::new();
        let scorer = FakeScorer::new();
        let object_store = FakeObjectStore::new();
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
        // Generous ceilings: rate limiting is exercised in its own tests.
        let limiters = Arc::new(DependencyLimiters::new(&RateLimitConfig {
            content_source_rpm: 10_000,
            script_generator_rpm: 10_000,
            video_provider_rpm: 10_000,
        }));

        let saga = GenerationSaga::new(
            Catalog::builtin(),
            stores.clone(),
            stores.clone(),
            provider.clone(),
            breaker.clone(),
            limiters.clone(),
            config,
        );
        let poller = CompletionPoller::new(
            stores.clone(),
            provider.clone(),
            object_store.clone(),
            scorer.clone(),
            limiters.clone(),
            saga.clone(),
        );
        let orchestrator = BatchOrchestrator::new(
            stores.clone(),
            FakeContentSource::new(),
            FakeScriptGenerator::new(),
            limiters,
            saga.clone(),
        );

        Self {
            stores,
            provider,
            scorer,
            object_store,
            breaker,
            saga,
            poller,
            orchestrator,
        }
    }
}

/// A low-risk 15-second UGC request: pixelwave-hd, capped to 10 s, $0.70,
/// 140 credits.
pub fn submit_request(owner_id: DbId) -> SubmitRequest {
    SubmitRequest {
        owner_id,
        script: "A sunny product shot on a wooden table.".to_string(),
        image_urls: vec!["https://cdn.example/product.jpg".to_string()],
        style: Style::Ugc,
        duration_secs: 15,
        quality_tier: QualityTier::Standard,
        auto_regenerate: false,
        aspect_ratio: "9:16".to_string(),
    }
}

/// Credits for the standard request above.
pub const REQUEST_CREDITS: i64 = 140;
