//! HMAC-signed JWT verification.
//!
//! Tokens are signed by the calling backend with the shared
//! `INTERNAL_JWT_SECRET`. Verification checks, in order:
//!
//! 1. JWS compact structure and header
//! 2. Algorithm is one of HS256/HS384/HS512
//! 3. Signature matches the shared key
//! 4. `exp` is present and strictly in the future
//! 5. `nbf`, when present, is not in the future
//!
//! Every failure in that list is reported as [`VerifyError::TokenInvalid`].
//! Callers never learn whether a token was malformed, expired or forged.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

/// Claims carried by an inter-service token, as decoded from the wire.
///
/// `iss` and `role` decode as empty when absent or not a JSON string, so a
/// signed token carrying them is refused by the policy check rather than as
/// malformed. `exp` and `nbf` are integral NumericDates.
#[derive(Debug, Deserialize)]
struct WireClaims {
    #[serde(default, deserialize_with = "string_or_empty")]
    iss: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    role: String,
    exp: u64,
    #[serde(default)]
    nbf: Option<u64>,
}

/// Claims of a token whose signature and lifetime have been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub issuer: String,
    pub role: String,
    pub expiration: DateTime<Utc>,
}

/// Verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Structural, signature, or lifetime failure.
    #[error("token is invalid")]
    TokenInvalid,

    /// Failure unrelated to the presented token (key or crypto backend).
    #[error("token verification failed internally: {0}")]
    Internal(String),
}

/// Verifies inter-service tokens against the process-wide shared key.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier for the given shared secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Lifetime is checked in `verify_at` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a token against the current system time.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        self.verify_at(token, jsonwebtoken::get_current_timestamp())
    }

    /// Verify a token as of `now` (seconds since the Unix epoch).
    ///
    /// A token is expired once `exp <= now`: the expiration second itself is
    /// already outside the validity window.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<VerifiedClaims, VerifyError> {
        let claims = jsonwebtoken::decode::<WireClaims>(token, &self.decoding_key, &self.validation)
            .map_err(classify)?
            .claims;

        if claims.exp <= now {
            debug!(exp = claims.exp, now, "Token expired");
            return Err(VerifyError::TokenInvalid);
        }

        if let Some(nbf) = claims.nbf
            && nbf > now
        {
            debug!(nbf, now, "Token not yet valid");
            return Err(VerifyError::TokenInvalid);
        }

        let expiration = i64::try_from(claims.exp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                debug!(exp = claims.exp, "Token expiration out of range");
                VerifyError::TokenInvalid
            })?;

        Ok(VerifiedClaims {
            issuer: claims.iss,
            role: claims.role,
            expiration,
        })
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    })
}

/// Collapse decoder errors into the two outcomes callers may see.
fn classify(err: JwtError) -> VerifyError {
    match err.kind() {
        ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Crypto(_) => VerifyError::Internal(err.to_string()),
        _ => {
            debug!(reason = %err, "Token rejected by decoder");
            VerifyError::TokenInvalid
        }
    }
}
