mod api;

pub use api::{HealthResponse, ImageUpload, IssueAssessment};
