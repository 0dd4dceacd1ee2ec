//! Gemini `generateContent` client.
//!
//! Sends the image inline (base64) together with the civic-issue prompt and
//! expects the model to answer with a bare JSON object:
//!
//! ```json
//! {"issue": "Pothole", "confidence_reason": "...", "priority": "High"}
//! ```
//!
//! Models sometimes wrap that object in a markdown code fence; the fence is
//! stripped before parsing. Missing or non-string fields fall back to an `INVALID` / `Low`
//! verdict rather than failing the request.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::IssueAnalyzer;
use super::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{ImageUpload, IssueAssessment};

const PROMPT: &str = r#"You are a civic issue verification AI for an urban reporting system.

Analyze the provided image and:
1. Identify if it shows a civic issue (Garbage, Pothole, Drainage, Streetlight, WaterLeak, etc.)
2. Classify the issue type
3. Assess the severity/priority
4. Determine if this appears to be a legitimate public issue

If the image does NOT show a clear civic issue or appears to be spam/invalid, respond with "INVALID".

RESPOND WITH STRICT JSON ONLY (no markdown, no text before/after):
{
  "issue": "Issue type or INVALID",
  "confidence_reason": "Brief explanation of what was detected",
  "priority": "High/Medium/Low"
}"#;

const TEMPERATURE: f32 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 500;

const DEFAULT_PRIORITY: &str = "Low";
const DEFAULT_REASON: &str = "Unable to analyze image";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    Text(&'static str),
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// [`IssueAnalyzer`] backed by a Gemini-compatible HTTP API.
#[derive(Clone)]
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for GeminiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAnalyzer")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl GeminiAnalyzer {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: &Config, circuit_breaker: Arc<CircuitBreaker>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.ai_request_timeout)
            .user_agent(concat!("civicfix-ai-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: generate_content_url(&config.ai_api_base_url, &config.ai_model),
            api_key: config.ai_api_key.clone(),
            circuit_breaker,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, image: &ImageUpload) -> AppResult<IssueAssessment> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [
                    RequestPart::Text(PROMPT),
                    RequestPart::InlineData(InlineData {
                        mime_type: &image.content_type,
                        data: BASE64.encode(&image.bytes),
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::AnalyzerResponse(format!(
                "status {status}: {}",
                truncate(&detail, 200)
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::AnalyzerResponse(format!("undecodable body: {e}")))?;

        let text = first_candidate_text(&payload)?;
        debug!(preview = %truncate(text, 100), "Model response text");
        parse_assessment(text)
    }
}

#[async_trait]
impl IssueAnalyzer for GeminiAnalyzer {
    #[instrument(skip(self, image), fields(size_bytes = image.len(), content_type = %image.content_type))]
    async fn analyze(&self, image: ImageUpload) -> AppResult<IssueAssessment> {
        if !self.circuit_breaker.allow_request().await {
            warn!("Analyzer circuit open, failing fast");
            return Err(AppError::AnalyzerUnavailable(
                "circuit breaker is open".to_string(),
            ));
        }

        let started = Instant::now();
        let result = self.call(&image).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(assessment) => {
                self.circuit_breaker.record_success().await;
                metrics::record_analyzer_request("success", elapsed);
                info!(
                    issue = %assessment.issue,
                    priority = %assessment.priority,
                    elapsed_secs = elapsed,
                    "Analysis complete"
                );
            }
            Err(e) => {
                // Bad answers count against the circuit as well as transport errors.
                self.circuit_breaker.record_failure().await;
                metrics::record_analyzer_request("failure", elapsed);
                warn!(error = %e, elapsed_secs = elapsed, "Analysis failed");
            }
        }

        result
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::AnalyzerTimeout(e.to_string())
    } else {
        AppError::AnalyzerUnavailable(e.to_string())
    }
}

fn first_candidate_text(response: &GenerateContentResponse) -> AppResult<&str> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.as_deref())
        .map(str::trim)
        .ok_or_else(|| AppError::AnalyzerResponse("response has no candidate text".to_string()))
}

/// Remove a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the model's verdict. Only non-blank string fields are taken; any
/// other value falls back to its default.
fn parse_assessment(text: &str) -> AppResult<IssueAssessment> {
    let verdict: serde_json::Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::AnalyzerResponse(format!("model output is not JSON: {e}")))?;

    let reason = string_field(&verdict, "confidence_reason")
        .or_else(|| string_field(&verdict, "confidenceReason"));

    Ok(IssueAssessment {
        issue: string_field(&verdict, "issue")
            .unwrap_or(IssueAssessment::INVALID)
            .to_string(),
        priority: string_field(&verdict, "priority")
            .unwrap_or(DEFAULT_PRIORITY)
            .to_string(),
        confidence_reason: reason.unwrap_or(DEFAULT_REASON).to_string(),
    })
}

fn string_field<'a>(verdict: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    verdict
        .get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s.get(..idx).unwrap_or(s),
        None => s,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_content_url() {
        assert_eq!(
            generate_content_url("https://example.test/", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [
                    RequestPart::Text("prompt"),
                    RequestPart::InlineData(InlineData {
                        mime_type: "image/png",
                        data: BASE64.encode(b"png"),
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "cG5n");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```json{\"a\":1}```  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_assessment_full() {
        let assessment = parse_assessment(
            r#"{"issue":"Pothole","confidence_reason":"Deep pothole","priority":"High"}"#,
        )
        .unwrap();

        assert_eq!(assessment.issue, "Pothole");
        assert_eq!(assessment.priority, "High");
        assert_eq!(assessment.confidence_reason, "Deep pothole");
    }

    #[test]
    fn test_parse_assessment_defaults() {
        let assessment = parse_assessment(r#"{"issue":""}"#).unwrap();

        assert_eq!(assessment.issue, "INVALID");
        assert_eq!(assessment.priority, "Low");
        assert_eq!(assessment.confidence_reason, "Unable to analyze image");
    }

    #[test]
    fn test_parse_assessment_non_string_fields_defaulted() {
        let assessment =
            parse_assessment(r#"{"issue":"Pothole","priority":3,"confidence_reason":null}"#)
                .unwrap();

        assert_eq!(assessment.issue, "Pothole");
        assert_eq!(assessment.priority, "Low");
        assert_eq!(assessment.confidence_reason, "Unable to analyze image");
    }

    #[test]
    fn test_parse_assessment_both_reason_spellings() {
        let assessment = parse_assessment(
            r#"{"issue":"Garbage","confidence_reason":"Overflowing bin","confidenceReason":"Bin"}"#,
        )
        .unwrap();
        assert_eq!(assessment.confidence_reason, "Overflowing bin");

        let assessment =
            parse_assessment(r#"{"issue":"Garbage","confidence_reason":"","confidenceReason":"Bin"}"#)
                .unwrap();
        assert_eq!(assessment.confidence_reason, "Bin");
    }

    #[test]
    fn test_parse_assessment_non_object_defaulted() {
        let assessment = parse_assessment("[1, 2, 3]").unwrap();
        assert_eq!(assessment.issue, "INVALID");
    }

    #[test]
    fn test_parse_assessment_not_json() {
        let err = parse_assessment("I think this is a pothole").unwrap_err();
        assert!(matches!(err, AppError::AnalyzerResponse(_)));
    }

    #[test]
    fn test_first_candidate_text_missing() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(
            first_candidate_text(&response),
            Err(AppError::AnalyzerResponse(_))
        ));

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(first_candidate_text(&response).is_err());
    }

    #[test]
    fn test_first_candidate_text_present() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"  {\"issue\":\"Garbage\"}\n"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            first_candidate_text(&response).unwrap(),
            r#"{"issue":"Garbage"}"#
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            ai_api_key: Some("AIza-secret".to_string()),
            ..Config::default()
        };
        let analyzer = GeminiAnalyzer::new(&config, Arc::new(CircuitBreaker::default())).unwrap();
        assert!(!format!("{analyzer:?}").contains("AIza-secret"));
    }
}
