//! Batch window math and backpressure constants (RF-18).
//!
//! Batches run in fixed-size concurrency windows. Items inside a window are
//! staggered by a per-item delay, and an inter-window delay separates
//! windows as a second backpressure layer on top of the per-dependency rate
//! limits.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults & limits
// ---------------------------------------------------------------------------

/// Items processed concurrently per window.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Delay between item starts inside a window.
pub const DEFAULT_ITEM_STAGGER_MS: u64 = 750;

/// Delay between windows.
pub const DEFAULT_INTER_WINDOW_DELAY_MS: u64 = 5_000;

/// Hard ceiling on items per batch submission.
pub const MAX_BATCH_ITEMS: usize = 100;

// ---------------------------------------------------------------------------
// Window math
// ---------------------------------------------------------------------------

/// Number of windows needed for `total` items at `window_size`.
pub fn window_count(total: usize, window_size: usize) -> usize {
    if window_size == 0 {
        return 0;
    }
    total.div_ceil(window_size)
}

/// Stagger delay for the item at `index_in_window` (0-based). The first
/// item in a window starts immediately.
pub fn stagger_delay(index_in_window: usize, base_ms: u64) -> Duration {
    Duration::from_millis(index_in_window as u64 * base_ms)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the number of items in a batch submission.
pub fn validate_batch_size(count: usize) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Validation(
            "Batch must contain at least one item".to_string(),
        ));
    }
    if count > MAX_BATCH_ITEMS {
        return Err(CoreError::Validation(format!(
            "Batch exceeds the maximum of {MAX_BATCH_ITEMS} items"
        )));
    }
    Ok(())
}

/// Validate a configured window size.
pub fn validate_window_size(size: usize) -> Result<(), CoreError> {
    if size == 0 {
        return Err(CoreError::Validation(
            "Window size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
