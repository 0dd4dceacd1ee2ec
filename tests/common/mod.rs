//! Shared helpers for router-level tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::Response;
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use civicfix_ai_gateway::models::{ImageUpload, IssueAssessment};
use civicfix_ai_gateway::{AppError, AppResult, AppState, Config, IssueAnalyzer, build_router};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ISSUER: &str = "civicfix-backend";
pub const ROLE: &str = "INTERNAL_SERVICE";

pub fn test_config() -> Config {
    Config {
        jwt_secret: SECRET.to_string(),
        metrics_port: 0,
        ..Config::default()
    }
}

pub fn now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

pub fn sign_with(claims: &Value, secret: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn sign(claims: &Value) -> String {
    sign_with(claims, SECRET)
}

pub fn claims(iss: &str, role: &str, exp: u64) -> Value {
    json!({ "iss": iss, "role": role, "iat": now(), "exp": exp })
}

/// A token the gate admits.
pub fn valid_token() -> String {
    sign(&claims(ISSUER, ROLE, now() + 600))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// What the mock analyzer answers with.
#[derive(Clone)]
pub enum MockOutcome {
    Assessment(IssueAssessment),
    Unavailable,
    Timeout,
    BadResponse,
}

/// Analyzer double that counts calls and remembers the last image.
pub struct MockAnalyzer {
    outcome: MockOutcome,
    calls: AtomicUsize,
    last_image: Mutex<Option<ImageUpload>>,
}

impl MockAnalyzer {
    pub fn new(outcome: MockOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    pub fn pothole() -> Arc<Self> {
        Self::new(MockOutcome::Assessment(IssueAssessment {
            issue: "Pothole".to_string(),
            priority: "High".to_string(),
            confidence_reason: "Large pothole in the carriageway".to_string(),
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<ImageUpload> {
        self.last_image.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueAnalyzer for MockAnalyzer {
    async fn analyze(&self, image: ImageUpload) -> AppResult<IssueAssessment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image);

        match &self.outcome {
            MockOutcome::Assessment(a) => Ok(a.clone()),
            MockOutcome::Unavailable => Err(AppError::AnalyzerUnavailable("mock down".into())),
            MockOutcome::Timeout => Err(AppError::AnalyzerTimeout("mock slow".into())),
            MockOutcome::BadResponse => Err(AppError::AnalyzerResponse("mock garbage".into())),
        }
    }
}

pub fn state_with(config: Config, analyzer: Arc<MockAnalyzer>) -> AppState {
    AppState::with_analyzer(config, analyzer)
}

/// Full application router backed by `analyzer`.
pub fn app(analyzer: Arc<MockAnalyzer>) -> Router {
    build_router(state_with(test_config(), analyzer))
}
