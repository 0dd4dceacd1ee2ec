//! Fuzz testing for bearer extraction and token verification.
//!
//! The gate runs on every inbound request, before any handler, so it must
//! never panic and must never admit a token it cannot verify.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_token
//! cargo +nightly fuzz run fuzz_token -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use civicfix_ai_gateway::auth::{TokenVerifier, extract_bearer_token};
use libfuzzer_sys::fuzz_target;

const SECRET: &[u8] = b"fuzz-secret-fuzz-secret-fuzz-secret-00";

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    authorization: Vec<u8>,
    token: String,
    now: u64,
}

fuzz_target!(|input: FuzzInput| {
    let verifier = TokenVerifier::new(SECRET);

    // Arbitrary header bytes through the extractor
    if let Ok(value) = HeaderValue::from_bytes(&input.authorization) {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        if let Some(token) = extract_bearer_token(&headers) {
            let _ = verifier.verify_at(token, input.now);
        }
    }

    // Arbitrary strings straight into the verifier. None are signed with
    // SECRET, so none may verify.
    let result = verifier.verify_at(&input.token, input.now);
    assert!(
        result.is_err() || input.token.split('.').count() == 3,
        "non-JWT input verified: {:?}",
        input.token
    );
});
