//! Shared application state for Axum handlers.
//!
//! Everything here is immutable after startup except the analyzer circuit
//! breaker, which guards its own state. Cloning is cheap: every component is
//! behind an `Arc`.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::analyzer::{CircuitBreaker, CircuitBreakerConfig, GeminiAnalyzer, IssueAnalyzer};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::error::AppResult;

/// Shared application state, cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Token verifier and claims policy used by the auth gate
    pub authenticator: Arc<Authenticator>,
    /// Image analysis collaborator
    pub analyzer: Arc<dyn IssueAnalyzer>,
    /// Breaker guarding the analyzer, also read by `/health` and `/ready`
    pub circuit_breaker: Arc<CircuitBreaker>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Build state with the Gemini analyzer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the analyzer HTTP client cannot be
    /// built.
    pub fn new(config: Config) -> AppResult<Self> {
        let circuit_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from(&config)));
        let analyzer = GeminiAnalyzer::new(&config, circuit_breaker.clone())?;
        info!(endpoint = %analyzer.endpoint(), "AI analyzer configured");

        Ok(Self::assemble(config, Arc::new(analyzer), circuit_breaker))
    }

    /// Build state around a caller-supplied analyzer.
    ///
    /// The breaker is created but not wired into `analyzer`; it only feeds
    /// the health endpoints.
    pub fn with_analyzer(config: Config, analyzer: Arc<dyn IssueAnalyzer>) -> Self {
        let circuit_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from(&config)));
        Self::assemble(config, analyzer, circuit_breaker)
    }

    fn assemble(
        config: Config,
        analyzer: Arc<dyn IssueAnalyzer>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let authenticator = Arc::new(Authenticator::from_config(&config));

        Self {
            config: Arc::new(config),
            authenticator,
            analyzer,
            circuit_breaker,
            started_at: Instant::now(),
        }
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
