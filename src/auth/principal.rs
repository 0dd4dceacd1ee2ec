//! The authenticated caller identity attached to each admitted request.
//!
//! The gate inserts an [`AuthenticatedPrincipal`] into the request's
//! extensions; handlers take it as an extractor argument. It lives exactly as
//! long as the request does.

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// Name every authenticated internal caller is known by.
pub const SERVICE_PRINCIPAL_NAME: &str = "CIVICFIX_SERVICE";

/// An authenticated internal caller.
///
/// Carries no roles or authorities: being present at all is the only grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    name: &'static str,
}

impl AuthenticatedPrincipal {
    /// The synthetic identity of the trusted internal service.
    pub fn internal_service() -> Self {
        Self {
            name: SERVICE_PRINCIPAL_NAME,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

impl fmt::Display for AuthenticatedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absence means the route was mounted outside the auth gate.
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::Internal("handler reached without an authenticated principal".to_string())
        })
    }
}
