use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image received from a calling backend, forwarded unmodified.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original file name, if the client sent one
    pub file_name: Option<String>,
    /// MIME type used when forwarding to the analyzer
    pub content_type: String,
    /// Raw image bytes
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Structured verdict on a reported civic issue.
///
/// Serialized with `confidenceReason`; the analyzer's own
/// `confidence_reason` spelling is accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAssessment {
    /// Issue category (e.g. "Pothole", "Garbage") or `INVALID`
    pub issue: String,
    /// `High`, `Medium` or `Low`
    pub priority: String,
    /// Short explanation of what was detected
    #[serde(rename = "confidenceReason", alias = "confidence_reason")]
    pub confidence_reason: String,
}

impl IssueAssessment {
    /// Marker the analyzer uses for images that show no civic issue.
    pub const INVALID: &'static str = "INVALID";

    /// Whether the analyzer recognised a genuine civic issue.
    pub fn is_valid_issue(&self) -> bool {
        !self.issue.eq_ignore_ascii_case(Self::INVALID)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while the analyzer circuit is open
    pub status: String,
    /// Analyzer circuit breaker state
    pub analyzer_circuit: String,
    /// Service version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_serializes_camel_case_reason() {
        let assessment = IssueAssessment {
            issue: "Pothole".to_string(),
            priority: "High".to_string(),
            confidence_reason: "Large pothole in the carriageway".to_string(),
        };

        let json = serde_json::to_value(&assessment).expect("Serialization should succeed");
        assert_eq!(json["issue"], "Pothole");
        assert_eq!(json["priority"], "High");
        assert_eq!(json["confidenceReason"], "Large pothole in the carriageway");
        assert!(json.get("confidence_reason").is_none());
    }

    #[test]
    fn test_assessment_accepts_snake_case_reason() {
        let json = r#"{"issue":"Garbage","priority":"Low","confidence_reason":"Overflowing bin"}"#;
        let assessment: IssueAssessment =
            serde_json::from_str(json).expect("Deserialization should succeed");

        assert_eq!(assessment.confidence_reason, "Overflowing bin");
    }

    #[test]
    fn test_invalid_issue_detection() {
        let mut assessment = IssueAssessment {
            issue: "INVALID".to_string(),
            priority: "Low".to_string(),
            confidence_reason: String::new(),
        };
        assert!(!assessment.is_valid_issue());

        assessment.issue = "Streetlight".to_string();
        assert!(assessment.is_valid_issue());
    }

    #[test]
    fn test_image_upload_len() {
        let upload = ImageUpload {
            file_name: None,
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG"),
        };
        assert_eq!(upload.len(), 4);
        assert!(!upload.is_empty());
    }
}
