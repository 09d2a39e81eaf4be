//! Circuit breaker for the video provider (RF-22).
//!
//! Tracks consecutive dispatch failures and fails fast once the provider is
//! judged unhealthy, so a known-bad upstream costs neither a network call
//! nor the caller's latency budget. One shared instance is injected into
//! every saga; construct isolated instances in tests.
//!
//! State machine: Closed -> (threshold consecutive failures) -> Open ->
//! (cool-down elapsed) -> HalfOpen -> probe success -> Closed, or probe
//! failure -> Open with the cool-down timer reset.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunable breaker parameters.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a probe.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Breaker state, exposed for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Set when transitioning to Open; the cool-down is measured from here.
    opened_at: Option<Instant>,
}

/// Permission to make one upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermit {
    /// Breaker is closed; call normally.
    Proceed,
    /// Breaker is half-open and this caller holds the single probe slot.
    Probe,
}

/// Raised when the breaker refuses a call.
#[derive(Debug, thiserror::Error)]
#[error("Provider circuit breaker open, retry after {retry_after:?}")]
pub struct BreakerOpen {
    /// Time until the next probe becomes possible. Zero while a probe from
    /// another caller is already in flight.
    pub retry_after: Duration,
}

// ---------------------------------------------------------------------------
// Breaker
// ---------------------------------------------------------------------------

/// Shared-instance circuit breaker. All transitions happen under one mutex
/// so concurrent sagas observe a consistent state.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state, for logs and health endpoints.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Ask permission to call the provider.
    ///
    /// Exactly one caller is granted [`CallPermit::Probe`] once the
    /// cool-down elapses; everyone else keeps failing fast until the probe
    /// resolves through [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn guard(&self) -> Result<CallPermit, BreakerOpen> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => Ok(CallPermit::Proceed),
            CircuitState::HalfOpen => Err(BreakerOpen {
                retry_after: Duration::ZERO,
            }),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(
                        breaker_state = CircuitState::HalfOpen.as_str(),
                        "Circuit breaker cool-down elapsed, probing provider",
                    );
                    Ok(CallPermit::Probe)
                } else {
                    Err(BreakerOpen {
                        retry_after: self.config.cooldown - elapsed,
                    })
                }
            }
        }
    }

    /// Record a successful provider call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                tracing::info!(
                    breaker_state = CircuitState::Closed.as_str(),
                    "Probe succeeded, circuit breaker closed",
                );
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
            }
            // A success landing while open (a call that started before the
            // trip) does not change the open state.
            CircuitState::Open => {}
        }
    }

    /// Record a failed provider call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        breaker_state = CircuitState::Open.as_str(),
                        consecutive_failures = inner.consecutive_failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit breaker opened",
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed: reopen with a fresh cool-down; the counter
                // stays at the value that tripped the breaker.
                inner.state = CircuitState::Open;
                inner.consecutive_failures = self.config.failure_threshold;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker_state = CircuitState::Open.as_str(),
                    "Probe failed, circuit breaker reopened",
                );
            }
            CircuitState::Open => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
