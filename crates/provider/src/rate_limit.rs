//! Per-dependency request-rate ceilings (RF-23).
//!
//! Each external dependency (content scraper, script generator, video
//! provider) gets its own GCRA limiter with a requests-per-minute quota.
//! [`DependencyLimiters::acquire`] blocks until capacity is available
//! rather than failing — rate pressure is backpressure, not an error.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// The rate-limited external dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    ContentSource,
    ScriptGenerator,
    VideoProvider,
}

impl Dependency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentSource => "content_source",
            Self::ScriptGenerator => "script_generator",
            Self::VideoProvider => "video_provider",
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Requests-per-minute ceilings, one per dependency.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub content_source_rpm: u32,
    pub script_generator_rpm: u32,
    pub video_provider_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            content_source_rpm: 30,
            script_generator_rpm: 20,
            video_provider_rpm: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Limiters
// ---------------------------------------------------------------------------

/// One GCRA limiter per dependency, shared across all in-flight sagas.
pub struct DependencyLimiters {
    content_source: Arc<DirectRateLimiter>,
    script_generator: Arc<DirectRateLimiter>,
    video_provider: Arc<DirectRateLimiter>,
}

fn direct(rpm: u32) -> Arc<DirectRateLimiter> {
    // A zero ceiling would deadlock every caller; clamp to one.
    let rpm = NonZeroU32::new(rpm).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

impl DependencyLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            content_source: direct(config.content_source_rpm),
            script_generator: direct(config.script_generator_rpm),
            video_provider: direct(config.video_provider_rpm),
        }
    }

    fn limiter(&self, dep: Dependency) -> &DirectRateLimiter {
        match dep {
            Dependency::ContentSource => &self.content_source,
            Dependency::ScriptGenerator => &self.script_generator,
            Dependency::VideoProvider => &self.video_provider,
        }
    }

    /// Wait until a request to `dep` is within its ceiling.
    ///
    /// Blocks (asynchronously) until the window admits the call; never
    /// errors. The wait is logged at debug when non-trivial.
    pub async fn acquire(&self, dep: Dependency) {
        let limiter = self.limiter(dep);
        if limiter.check().is_ok() {
            return;
        }
        tracing::debug!(dependency = dep.as_str(), "Rate limit reached, waiting");
        limiter.until_ready().await;
    }

    /// Non-blocking probe, for tests and metrics.
    pub fn try_acquire(&self, dep: Dependency) -> bool {
        self.limiter(dep).check().is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
