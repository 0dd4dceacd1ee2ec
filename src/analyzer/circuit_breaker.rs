//! Circuit breaker around the AI analyzer.
//!
//! ```text
//!            failures ≥ threshold
//!   Closed ───────────────────────► Open
//!     ▲                              │ open_duration elapsed
//!     │ successes ≥ threshold        ▼
//!     └────────────────────────── HalfOpen ──any failure──► Open
//! ```
//!
//! While open, analyzer calls fail immediately with 503 instead of waiting
//! for the upstream timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open.
    fn gauge_value(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Thresholds for opening and closing the circuit.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for CircuitBreakerConfig {
    fn from(config: &Config) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_failure_threshold,
            success_threshold: config.circuit_breaker_success_threshold,
            open_duration: config.circuit_breaker_open_duration,
        }
    }
}

#[derive(Debug)]
struct Tracking {
    state: CircuitState,
    opened_at: Option<Instant>,
    failures: u32,
    successes: u32,
}

impl Tracking {
    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.successes = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.failures = 0;
        self.successes = 0;
    }

    fn open_elapsed(&self, open_duration: Duration) -> bool {
        self.opened_at
            .is_none_or(|opened_at| opened_at.elapsed() >= open_duration)
    }
}

/// Thread-safe circuit breaker shared by every analyzer call.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    tracking: RwLock<Tracking>,
    times_opened: AtomicU64,
    requests_rejected: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            tracking: RwLock::new(Tracking {
                state: CircuitState::Closed,
                opened_at: None,
                failures: 0,
                successes: 0,
            }),
            times_opened: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
        }
    }

    /// Whether a call may proceed. Moves Open to HalfOpen once the open
    /// period has elapsed.
    pub async fn allow_request(&self) -> bool {
        {
            let tracking = self.tracking.read().await;
            match tracking.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open if !tracking.open_elapsed(self.config.open_duration) => {
                    self.reject();
                    return false;
                }
                CircuitState::Open => {}
            }
        }

        let mut tracking = self.tracking.write().await;
        // Another task may have moved the state while we waited for the write lock.
        match tracking.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open if tracking.open_elapsed(self.config.open_duration) => {
                tracking.state = CircuitState::HalfOpen;
                tracking.successes = 0;
                metrics::set_circuit_breaker_state(CircuitState::HalfOpen.gauge_value());
                info!("Analyzer circuit half-open, probing");
                true
            }
            CircuitState::Open => {
                self.reject();
                false
            }
        }
    }

    pub async fn record_success(&self) {
        let mut tracking = self.tracking.write().await;
        match tracking.state {
            CircuitState::Closed => tracking.failures = 0,
            CircuitState::HalfOpen => {
                tracking.successes += 1;
                debug!(
                    successes = tracking.successes,
                    threshold = self.config.success_threshold,
                    "Analyzer probe succeeded"
                );
                if tracking.successes >= self.config.success_threshold {
                    tracking.close();
                    metrics::set_circuit_breaker_state(CircuitState::Closed.gauge_value());
                    info!("Analyzer circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut tracking = self.tracking.write().await;
        match tracking.state {
            CircuitState::Closed => {
                tracking.failures += 1;
                if tracking.failures >= self.config.failure_threshold {
                    tracking.open();
                    self.opened();
                    warn!(
                        failures = tracking.failures,
                        open_duration = ?self.config.open_duration,
                        "Analyzer circuit opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                tracking.open();
                self.opened();
                warn!("Analyzer circuit reopened after failed probe");
            }
            CircuitState::Open => tracking.opened_at = Some(Instant::now()),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.tracking.read().await.state
    }

    pub fn times_opened(&self) -> u64 {
        self.times_opened.load(Ordering::Relaxed)
    }

    pub fn requests_rejected(&self) -> u64 {
        self.requests_rejected.load(Ordering::Relaxed)
    }

    fn opened(&self) {
        self.times_opened.fetch_add(1, Ordering::Relaxed);
        metrics::record_circuit_breaker_open();
        metrics::set_circuit_breaker_state(CircuitState::Open.gauge_value());
    }

    fn reject(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::record_circuit_breaker_rejection();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
