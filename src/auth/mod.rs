//! Inter-service authentication.
//!
//! Calling backends sign a short-lived JWT with the shared
//! `INTERNAL_JWT_SECRET` and present it as `Authorization: Bearer <token>`.
//! This module decides, per request, whether that credential admits the
//! caller:
//!
//! - [`bearer`]: pull the token out of the header
//! - [`token`]: verify signature and lifetime
//! - [`policy`]: require issuer `civicfix-backend` and role `INTERNAL_SERVICE`
//! - [`principal`]: the identity handed to downstream handlers
//! - [`authenticator`]: the ordered decision over all of the above
//!
//! The tower layer that applies the decision to HTTP traffic lives in
//! [`crate::middleware::auth`].

pub mod authenticator;
pub mod bearer;
pub mod policy;
pub mod principal;
pub mod token;

pub use authenticator::{AuthRejection, Authenticator, GateStage};
pub use bearer::{BEARER_PREFIX, extract_bearer_token};
pub use policy::{AuthorizationPolicy, PolicyViolation};
pub use principal::{AuthenticatedPrincipal, SERVICE_PRINCIPAL_NAME};
pub use token::{TokenVerifier, VerifiedClaims, VerifyError};
