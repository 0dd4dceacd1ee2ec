//! AI analyzer collaborator.
//!
//! The gateway owns no image understanding of its own. An [`IssueAnalyzer`]
//! receives the uploaded image and returns an [`IssueAssessment`]; the
//! production implementation is [`GeminiAnalyzer`], guarded by a
//! [`CircuitBreaker`] so a failing model does not tie up request workers.

mod circuit_breaker;
mod gemini;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{ImageUpload, IssueAssessment};

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use gemini::{API_KEY_HEADER, GeminiAnalyzer};

/// Turns an uploaded image into a civic-issue verdict.
///
/// Implementations map their own failures onto the analyzer variants of
/// [`crate::AppError`] (unavailable, timeout, invalid response).
#[async_trait]
pub trait IssueAnalyzer: Send + Sync {
    async fn analyze(&self, image: ImageUpload) -> AppResult<IssueAssessment>;
}
