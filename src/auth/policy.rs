//! Claim-level authorization policy.

use thiserror::Error;

use super::token::VerifiedClaims;
use crate::config::{Config, DEFAULT_REQUIRED_ISSUER, DEFAULT_REQUIRED_ROLE};

/// Why a verified token was refused.
///
/// Logged server-side only; callers always see `403 Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("issuer does not match")]
    IssuerMismatch,

    #[error("role does not match")]
    RoleMismatch,
}

/// The single caller identity allowed through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    required_issuer: String,
    required_role: String,
}

impl AuthorizationPolicy {
    pub fn new(required_issuer: impl Into<String>, required_role: impl Into<String>) -> Self {
        Self {
            required_issuer: required_issuer.into(),
            required_role: required_role.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.required_issuer, &config.required_role)
    }

    pub fn required_issuer(&self) -> &str {
        &self.required_issuer
    }

    pub fn required_role(&self) -> &str {
        &self.required_role
    }

    /// Accept iff both issuer and role match exactly.
    ///
    /// The issuer is checked first, so a token wrong on both counts reports
    /// `IssuerMismatch`.
    pub fn check(&self, claims: &VerifiedClaims) -> Result<(), PolicyViolation> {
        if claims.issuer != self.required_issuer {
            return Err(PolicyViolation::IssuerMismatch);
        }
        if claims.role != self.required_role {
            return Err(PolicyViolation::RoleMismatch);
        }
        Ok(())
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_ISSUER, DEFAULT_REQUIRED_ROLE)
    }
}
