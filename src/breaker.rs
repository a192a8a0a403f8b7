//! Circuit Breaker
//!
//! Failure guard protecting the remote tier (L2).
//!
//! The breaker watches consecutive failures and moves between three states:
//!
//! ```text
//!        threshold failures
//! CLOSED ------------------> OPEN
//!   ^                          |
//!   | success in HALF_OPEN     | timeout elapsed since last failure
//!   |                          v
//!   +------ HALF_OPEN <--------+
//!              |
//!              | any failure
//!              v
//!            OPEN
//! ```
//!
//! The OPEN -> HALF_OPEN edge is computed lazily on state reads rather than
//! by a background task, so the breaker owns no runtime resources.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::CircuitBreakerSettings;
use crate::error::CacheError;

/// Backend label carried into [`CacheError::CircuitOpen`].
const GUARDED_BACKEND: &str = "L2";

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Tripped: guarded calls are refused.
    Open,
    /// Probing: the next guarded call decides between Closed and Open.
    HalfOpen,
}

/// Point-in-time breaker snapshot, embedded into coordinator stats.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub enabled: bool,
    pub state: BreakerState,
    pub failure_count: u32,
    pub threshold: u32,
    pub timeout: u64,
    /// Wall-clock seconds of the last recorded failure, if any.
    pub last_failure_time: Option<f64>,
    /// Wall-clock seconds of the last recorded success, if any.
    pub last_success_time: Option<f64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    /// Monotonic instant of the last failure, driving the lazy transition.
    last_failure: Option<Instant>,
    /// Wall-clock copies, kept only for stats reporting.
    last_failure_at: Option<f64>,
    last_success_at: Option<f64>,
}

/// Three-state failure guard for L2 calls.
///
/// All transitions happen under a single mutex, so concurrent readers see a
/// consistent state. A disabled breaker permanently reports [`BreakerState::Closed`]
/// and ignores recorded outcomes.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: CircuitBreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker from validated settings.
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_at: None,
                last_success_at: None,
            }),
        }
    }

    /// Current state, applying the lazy OPEN -> HALF_OPEN transition when the
    /// configured timeout has elapsed since the last failure.
    pub fn state(&self) -> BreakerState {
        if !self.settings.enabled {
            return BreakerState::Closed;
        }

        let mut inner = self.inner.lock();
        if inner.state == BreakerState::Open && Self::reset_due(&inner, self.settings.timeout) {
            inner.state = BreakerState::HalfOpen;
            info!("Circuit breaker entering HALF_OPEN state");
        }
        inner.state
    }

    fn reset_due(inner: &BreakerInner, timeout: u64) -> bool {
        match inner.last_failure {
            Some(at) => at.elapsed() >= Duration::from_secs(timeout),
            None => false,
        }
    }

    /// True iff the breaker currently refuses guarded calls.
    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    /// Consecutive failures recorded since the last success or reset.
    pub fn failure_count(&self) -> u32 {
        if !self.settings.enabled {
            return 0;
        }
        self.inner.lock().failure_count
    }

    /// Records a successful guarded operation.
    ///
    /// A success while probing (HALF_OPEN) closes the circuit.
    pub fn record_success(&self) {
        if !self.settings.enabled {
            return;
        }

        let mut inner = self.inner.lock();
        inner.last_success_at = Some(epoch_seconds());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.failure_count = 0;
                info!("Circuit breaker CLOSED after successful test");
            }
            BreakerState::Closed => {
                if inner.failure_count > 0 {
                    debug!(
                        failures = inner.failure_count,
                        "Resetting circuit breaker failure count"
                    );
                    inner.failure_count = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Records a failed guarded operation.
    ///
    /// A failure while probing reopens the circuit immediately; in CLOSED the
    /// circuit opens once the consecutive-failure threshold is reached.
    pub fn record_failure(&self) {
        if !self.settings.enabled {
            return;
        }

        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(epoch_seconds());

        warn!(
            failures = inner.failure_count,
            threshold = self.settings.threshold,
            "Circuit breaker failure recorded"
        );

        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            error!("Circuit breaker OPEN after failed test in HALF_OPEN");
        } else if inner.state == BreakerState::Closed
            && inner.failure_count >= self.settings.threshold
        {
            inner.state = BreakerState::Open;
            error!(
                failures = inner.failure_count,
                threshold = self.settings.threshold,
                "Circuit breaker OPEN"
            );
        }
    }

    /// Runs `op` under the breaker's protection.
    ///
    /// Refuses with [`CacheError::CircuitOpen`] while the circuit is open;
    /// otherwise invokes `op` and records its outcome.
    ///
    /// # Example
    /// ```rust,ignore
    /// let value = breaker.call(|| remote.get("user:42")).await?;
    /// ```
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        if self.is_open() {
            return Err(CacheError::CircuitOpen {
                backend: GUARDED_BACKEND.to_string(),
                failure_count: self.failure_count(),
            });
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Unconditionally returns to CLOSED with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.last_failure_at = None;
        inner.last_success_at = None;
        info!("Circuit breaker manually reset to CLOSED");
    }

    /// Snapshot for stats reporting.
    pub fn stats(&self) -> BreakerStats {
        let state = self.state();
        let inner = self.inner.lock();
        BreakerStats {
            enabled: self.settings.enabled,
            state,
            failure_count: inner.failure_count,
            threshold: self.settings.threshold,
            timeout: self.settings.timeout,
            last_failure_time: inner.last_failure_at,
            last_success_time: inner.last_success_at,
        }
    }

    /// Rewinds the last failure instant, as if it happened `by` earlier.
    #[cfg(test)]
    pub(crate) fn backdate_last_failure(&self, by: Duration) {
        let mut inner = self.inner.lock();
        if let Some(at) = inner.last_failure {
            inner.last_failure = Some(at - by);
        }
    }
}

fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
