//! Bearer credential extraction from the `Authorization` header.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Required scheme prefix. Case-sensitive, exactly one space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from request headers.
///
/// Returns `None` when the header is absent, is not visible ASCII, or does
/// not start with [`BEARER_PREFIX`]. The returned slice is everything after
/// the prefix, unmodified.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}
