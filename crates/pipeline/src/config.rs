//! Pipeline configuration loaded from environment variables.
//!
//! Policy knobs (quality threshold, regeneration cap, timeout, batch
//! pacing) are configuration rather than hard-coded constants. All fields
//! have defaults suitable for local development; override via environment
//! variables in production.

use std::time::Duration;

use reelforge_core::batching::{
    DEFAULT_INTER_WINDOW_DELAY_MS, DEFAULT_ITEM_STAGGER_MS, DEFAULT_WINDOW_SIZE,
};
use reelforge_core::quality::{DEFAULT_MAX_AUTO_REGENERATIONS, DEFAULT_QUALITY_THRESHOLD};

/// Wall-clock ceiling on a job staying in `processing`, in minutes.
const DEFAULT_PROCESSING_TIMEOUT_MINS: u64 = 60;

/// Default completion-poller tick interval.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum acceptable quality score (default: `0.7`).
    pub quality_threshold: f64,
    /// Auto-regenerations allowed per original job (default: `1`).
    pub max_auto_regenerations: i32,
    /// Force-fail jobs processing longer than this (default: 60 minutes).
    pub processing_timeout: Duration,
    /// Completion poller tick interval (default: 10 seconds).
    pub poll_interval: Duration,
    /// Concurrent items per batch window (default: `5`).
    pub batch_window_size: usize,
    /// Delay between item starts inside a window (default: 750 ms).
    pub item_stagger: Duration,
    /// Delay between batch windows (default: 5 seconds).
    pub inter_window_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            max_auto_regenerations: DEFAULT_MAX_AUTO_REGENERATIONS,
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_MINS * 60),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            batch_window_size: DEFAULT_WINDOW_SIZE,
            item_stagger: Duration::from_millis(DEFAULT_ITEM_STAGGER_MS),
            inter_window_delay: Duration::from_millis(DEFAULT_INTER_WINDOW_DELAY_MS),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `QUALITY_SCORE_THRESHOLD`     | `0.7`   |
    /// | `MAX_AUTO_REGENERATIONS`      | `1`     |
    /// | `PROCESSING_TIMEOUT_MINS`     | `60`    |
    /// | `POLL_INTERVAL_SECS`          | `10`    |
    /// | `BATCH_WINDOW_SIZE`           | `5`     |
    /// | `BATCH_ITEM_STAGGER_MS`       | `750`   |
    /// | `BATCH_INTER_WINDOW_DELAY_MS` | `5000`  |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let quality_threshold: f64 = env_or("QUALITY_SCORE_THRESHOLD", defaults.quality_threshold);
        reelforge_core::quality::validate_threshold(quality_threshold)
            .expect("QUALITY_SCORE_THRESHOLD out of range");

        Self {
            quality_threshold,
            max_auto_regenerations: env_or(
                "MAX_AUTO_REGENERATIONS",
                defaults.max_auto_regenerations,
            ),
            processing_timeout: Duration::from_secs(
                env_or("PROCESSING_TIMEOUT_MINS", DEFAULT_PROCESSING_TIMEOUT_MINS) * 60,
            ),
            poll_interval: Duration::from_secs(env_or(
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            batch_window_size: env_or("BATCH_WINDOW_SIZE", defaults.batch_window_size),
            item_stagger: Duration::from_millis(env_or(
                "BATCH_ITEM_STAGGER_MS",
                DEFAULT_ITEM_STAGGER_MS,
            )),
            inter_window_delay: Duration::from_millis(env_or(
                "BATCH_INTER_WINDOW_DELAY_MS",
                DEFAULT_INTER_WINDOW_DELAY_MS,
            )),
        }
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{var} must parse: {e:?}")),
        Err(_) => default,
    }
}
