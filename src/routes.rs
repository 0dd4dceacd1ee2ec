//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets X-Request-Id if absent, echoes it back
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Internal JWT    │ ← 401/403/500 (bypassed for /health, /ready)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 above MAX_REQUEST_BODY_SIZE
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! Rejected requests are still traced and carry a request id.

use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use crate::handlers;
use crate::middleware::InternalJwtAuth;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let cors = build_cors_layer(&config.cors_allowed_origins);

    let mut router = Router::new()
        // Health endpoints (auth bypassed by default)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Image verification
        .route("/ai/verify", post(handlers::verify_issue));

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Request body size limit
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 2. Inter-service JWT gate
    let auth_layer = InternalJwtAuth::from_config(state.authenticator.clone(), config);
    info!(
        issuer = %state.authenticator.policy().required_issuer(),
        role = %state.authenticator.policy().required_role(),
        bypass = ?auth_layer.bypass_paths(),
        "Internal JWT authentication enabled"
    );
    router = router.layer(auth_layer);

    // 3. CORS
    router = router.layer(cors);

    // 4. Tracing
    router = router.layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id = req
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!(
            "http_request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = %request_id,
        )
    }));

    // 5. Request ID (outermost so every log line and response carries one)
    router = router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    router.with_state(state)
}

/// Build CORS layer from configuration.
///
/// `["*"]` allows any origin. Callers are backend services, so browsers are
/// not expected; keep the list explicit in production.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
