//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with analyzer circuit state
//! - `GET /ready` - Readiness probe
//!
//! # Health vs Readiness
//!
//! - **Health** (`/health`): Returns 200 even if degraded, includes details
//! - **Readiness** (`/ready`): Returns 503 while the analyzer circuit is open
//!
//! Both are on the default auth bypass list so orchestrator probes need no
//! token.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::analyzer::CircuitState;
use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// Always returns 200 OK with status details in the body.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "analyzer_circuit": "closed",
///   "version": "0.1.0",
///   "uptime_seconds": 42,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let circuit = state.circuit_breaker.state().await;

    Json(HealthResponse {
        status: if circuit == CircuitState::Open {
            "degraded"
        } else {
            "healthy"
        }
        .to_string(),
        analyzer_circuit: circuit.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// Half-open counts as ready: probe traffic is what closes the circuit.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match state.circuit_breaker.state().await {
        CircuitState::Open => Err(StatusCode::SERVICE_UNAVAILABLE),
        CircuitState::Closed | CircuitState::HalfOpen => Ok(StatusCode::OK),
    }
}
