//! Per-request authentication decision.
//!
//! # State Machine
//!
//! ```text
//! Start ──header ok──► HeaderChecked ──verified──► TokenVerified ──policy ok──► ClaimsChecked ──► Authenticated
//!   │                       │                          │
//!   │ absent/malformed      │ invalid token            │ issuer/role mismatch
//!   ▼                       ▼                          ▼
//! Rejected(401)        Rejected(401)              Rejected(403)
//! ```
//!
//! Any stage may also end in `Rejected(500)` on an internal fault.

use std::fmt;

use axum::body::Body;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use tracing::{debug, error, warn};

use super::bearer::extract_bearer_token;
use super::policy::{AuthorizationPolicy, PolicyViolation};
use super::principal::AuthenticatedPrincipal;
use super::token::{TokenVerifier, VerifyError};
use crate::config::Config;

/// Non-terminal stages of the gate, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Start,
    HeaderChecked,
    TokenVerified,
    ClaimsChecked,
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateStage::Start => "start",
            GateStage::HeaderChecked => "header_checked",
            GateStage::TokenVerified => "token_verified",
            GateStage::ClaimsChecked => "claims_checked",
        };
        f.write_str(name)
    }
}

/// Terminal failure of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header, or not `Bearer `.
    MissingCredential,
    /// Token failed structural, signature, or lifetime checks.
    TokenInvalid,
    /// Token verified but issuer or role is not the allowed one.
    PolicyMismatch(PolicyViolation),
    /// Fault unrelated to the caller's credential.
    Internal(String),
}

impl AuthRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthRejection::MissingCredential | AuthRejection::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            AuthRejection::PolicyMismatch(_) => StatusCode::FORBIDDEN,
            AuthRejection::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stage the gate was in when it rejected.
    pub fn stage(&self) -> GateStage {
        match self {
            AuthRejection::MissingCredential => GateStage::Start,
            AuthRejection::TokenInvalid | AuthRejection::Internal(_) => GateStage::HeaderChecked,
            AuthRejection::PolicyMismatch(_) => GateStage::TokenVerified,
        }
    }

    /// Metric/log label.
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthRejection::MissingCredential => "missing_credential",
            AuthRejection::TokenInvalid => "token_invalid",
            AuthRejection::PolicyMismatch(_) => "policy_mismatch",
            AuthRejection::Internal(_) => "internal",
        }
    }
}

impl From<VerifyError> for AuthRejection {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::TokenInvalid => AuthRejection::TokenInvalid,
            VerifyError::Internal(msg) => AuthRejection::Internal(msg),
        }
    }
}

impl IntoResponse for AuthRejection {
    /// Status only, empty body.
    fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        let mut response = status.into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Runs extractor, verifier, and policy check for one request.
///
/// Holds only immutable state, so a single instance is shared by every
/// concurrent request.
#[derive(Debug, Clone)]
pub struct Authenticator {
    verifier: TokenVerifier,
    policy: AuthorizationPolicy,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, policy: AuthorizationPolicy) -> Self {
        Self { verifier, policy }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TokenVerifier::new(config.jwt_secret.as_bytes()),
            AuthorizationPolicy::from_config(config),
        )
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Decide whether the request carrying `headers` is admitted.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedPrincipal, AuthRejection> {
        // Start -> HeaderChecked
        let token = extract_bearer_token(headers).ok_or_else(|| {
            warn!(stage = %GateStage::Start, "Missing or malformed Authorization header");
            AuthRejection::MissingCredential
        })?;

        // HeaderChecked -> TokenVerified
        let claims = self.verifier.verify(token).map_err(|e| {
            match &e {
                VerifyError::TokenInvalid => {
                    warn!(stage = %GateStage::HeaderChecked, "Bearer token failed verification")
                }
                VerifyError::Internal(msg) => {
                    error!(stage = %GateStage::HeaderChecked, error = %msg, "Token verifier fault")
                }
            }
            AuthRejection::from(e)
        })?;
        debug!(
            issuer = %claims.issuer,
            role = %claims.role,
            expires_at = %claims.expiration,
            "Bearer token verified"
        );

        // TokenVerified -> ClaimsChecked
        self.policy.check(&claims).map_err(|violation| {
            warn!(
                stage = %GateStage::TokenVerified,
                reason = %violation,
                issuer = %claims.issuer,
                role = %claims.role,
                "Token claims rejected by policy"
            );
            AuthRejection::PolicyMismatch(violation)
        })?;

        // ClaimsChecked -> Authenticated
        let principal = AuthenticatedPrincipal::internal_service();
        debug!(stage = %GateStage::ClaimsChecked, principal = %principal, "Caller authenticated");
        Ok(principal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "authenticator-test-secret-0123456789abcdef";

    fn authenticator() -> Authenticator {
        Authenticator::new(
            TokenVerifier::new(SECRET.as_bytes()),
            AuthorizationPolicy::default(),
        )
    }

    fn bearer(iss: &str, role: &str, ttl_secs: i64) -> HeaderMap {
        let exp = jsonwebtoken::get_current_timestamp() as i64 + ttl_secs;
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"iss": iss, "role": role, "exp": exp}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn test_missing_header_rejected_at_start() {
        let rejection = authenticator().authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(rejection, AuthRejection::MissingCredential);
        assert_eq!(rejection.stage(), GateStage::Start);
        assert_eq!(rejection.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_invalid_token_rejected_after_header_check() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer garbage".parse().unwrap());

        let rejection = authenticator().authenticate(&headers).unwrap_err();
        assert_eq!(rejection, AuthRejection::TokenInvalid);
        assert_eq!(rejection.stage(), GateStage::HeaderChecked);
        assert_eq!(rejection.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_rejected() {
        let headers = bearer("civicfix-backend", "INTERNAL_SERVICE", -60);
        let rejection = authenticator().authenticate(&headers).unwrap_err();
        assert_eq!(rejection, AuthRejection::TokenInvalid);
    }

    #[test]
    fn test_policy_mismatch_is_forbidden() {
        let headers = bearer("civicfix-backend", "USER", 300);
        let rejection = authenticator().authenticate(&headers).unwrap_err();
        assert_eq!(
            rejection,
            AuthRejection::PolicyMismatch(PolicyViolation::RoleMismatch)
        );
        assert_eq!(rejection.stage(), GateStage::TokenVerified);
        assert_eq!(rejection.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_valid_token_authenticates() {
        let headers = bearer("civicfix-backend", "INTERNAL_SERVICE", 300);
        let principal = authenticator().authenticate(&headers).unwrap();
        assert_eq!(principal.name(), "CIVICFIX_SERVICE");
    }

    #[test]
    fn test_internal_fault_is_500() {
        let rejection = AuthRejection::from(VerifyError::Internal("backend".into()));
        assert_eq!(rejection.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rejection.outcome(), "internal");
    }

    #[test]
    fn test_rejection_response_shape() {
        let response = AuthRejection::TokenInvalid.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let response =
            AuthRejection::PolicyMismatch(PolicyViolation::IssuerMismatch).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
