//! Inter-service JWT authentication gate.
//!
//! # Behaviour
//!
//! For every request not on a bypass path:
//!
//! 1. Run the [`Authenticator`] over the request headers
//! 2. On success, insert the [`AuthenticatedPrincipal`] into the request
//!    extensions and call the inner service, returning its response as-is
//! 3. On failure, answer with the rejection status and an empty body. The
//!    inner service is never called.
//!
//! | Failure | Status |
//! |---|---|
//! | header missing / not `Bearer ` | 401 |
//! | bad signature, malformed, expired | 401 |
//! | wrong issuer or role | 403 |
//! | verifier fault | 500 |
//!
//! # Bypassed Endpoints
//!
//! Bypass paths use exact, case-sensitive matching against
//! `request.uri().path()`. Default: `/health`, `/ready`, so probes work
//! without credentials. Unknown paths are gated like any other.
//!
//! # Cancellation
//!
//! The decision is made synchronously before the response future is
//! created. If that future is dropped, the request (and the principal in its
//! extensions) is dropped with it.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use crate::auth::{AuthenticatedPrincipal, Authenticator};
use crate::config::Config;
use crate::metrics;

/// Paths that bypass the gate when none are configured explicitly.
const DEFAULT_BYPASS_PATHS: [&str; 2] = ["/health", "/ready"];

/// Tower layer applying the inter-service auth gate.
#[derive(Clone)]
pub struct InternalJwtAuth {
    authenticator: Arc<Authenticator>,
    bypass_paths: Arc<Vec<String>>,
}

impl InternalJwtAuth {
    pub fn new(authenticator: Arc<Authenticator>, bypass_paths: Vec<String>) -> Self {
        Self {
            authenticator,
            bypass_paths: Arc::new(bypass_paths),
        }
    }

    /// Create with default bypass paths ("/health", "/ready").
    pub fn with_defaults(authenticator: Arc<Authenticator>) -> Self {
        Self::new(
            authenticator,
            DEFAULT_BYPASS_PATHS.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    pub fn from_config(authenticator: Arc<Authenticator>, config: &Config) -> Self {
        Self::new(authenticator, config.auth_bypass_paths.clone())
    }

    pub fn bypass_paths(&self) -> &[String] {
        &self.bypass_paths
    }
}

impl<S> Layer<S> for InternalJwtAuth {
    type Service = InternalJwtAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InternalJwtAuthService {
            inner,
            authenticator: self.authenticator.clone(),
            bypass_paths: self.bypass_paths.clone(),
        }
    }
}

/// Service produced by [`InternalJwtAuth`].
#[derive(Clone)]
pub struct InternalJwtAuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
    bypass_paths: Arc<Vec<String>>,
}

impl<S> Service<Request<Body>> for InternalJwtAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path();
        if self.bypass_paths.iter().any(|p| p == path) {
            debug!(path, "Bypassing auth gate");
            return Box::pin(async move { inner.call(req).await });
        }

        let decision = self.authenticator.authenticate(req.headers());
        match decision {
            Ok(principal) => {
                metrics::record_auth_decision("authenticated");
                attach_principal(&mut req, principal);
                Box::pin(async move { inner.call(req).await })
            }
            Err(rejection) => {
                metrics::record_auth_decision(rejection.outcome());
                debug!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    status = rejection.status_code().as_u16(),
                    "Request rejected by auth gate"
                );
                let response = rejection.into_response();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Make the principal available to downstream extractors for this request only.
fn attach_principal<B>(req: &mut Request<B>, principal: AuthenticatedPrincipal) {
    req.extensions_mut().insert(principal);
}
