//! # CivicFix AI Gateway
//!
//! Internal HTTP gateway that accepts civic issue photos from the CivicFix
//! backend, forwards them to an AI model and returns a structured verdict.
//!
//! - **Inter-service auth**: every request carries an HMAC-signed JWT
//!   (`Authorization: Bearer <token>`) issued by the backend
//! - **Resilience**: circuit breaker around the AI analyzer
//! - **Observability**: request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → CORS → JWT gate)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, ready, /ai/verify)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IssueAnalyzer (GeminiAnalyzer + CircuitBreaker)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Gemini-compatible generateContent API                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Request Decisions
//!
//! | Request | Outcome |
//! |---|---|
//! | no / non-Bearer `Authorization` | 401 |
//! | bad signature, malformed or expired token | 401 |
//! | wrong `iss` or `role` claim | 403 |
//! | valid token | handler runs as `CIVICFIX_SERVICE` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use civicfix_ai_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! INTERNAL_JWT_SECRET=$(openssl rand -hex 32) AI_API_KEY=... cargo run
//! ```

pub mod analyzer;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use analyzer::{GeminiAnalyzer, IssueAnalyzer};
pub use auth::{AuthenticatedPrincipal, Authenticator};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
