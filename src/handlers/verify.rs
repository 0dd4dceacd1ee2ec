//! Civic issue verification endpoint.
//!
//! - `POST /ai/verify` - multipart upload with an `image` field
//!
//! The request only reaches this handler after the auth gate has attached
//! an [`AuthenticatedPrincipal`]. The image bytes are forwarded to the
//! analyzer unmodified; only the declared MIME type is normalised.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use tracing::{debug, instrument};

use crate::auth::AuthenticatedPrincipal;
use crate::error::{AppError, AppResult};
use crate::models::{ImageUpload, IssueAssessment};
use crate::state::AppState;
use crate::validation::{IMAGE_FIELD, normalize_mime_type, validate_image_payload};

/// Analyze an uploaded image.
///
/// # Response Body
///
/// ```json
/// {
///   "issue": "Pothole",
///   "priority": "High",
///   "confidenceReason": "Large pothole visible in the road surface"
/// }
/// ```
///
/// # Errors
///
/// - 400 if the `image` field is missing or empty (analyzer not called)
/// - 413 if the body exceeds `MAX_REQUEST_BODY_SIZE`
/// - 502 / 503 / 504 for analyzer failures
#[instrument(skip(state, multipart), fields(principal = %principal))]
pub async fn verify_issue(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    mut multipart: Multipart,
) -> AppResult<Json<IssueAssessment>> {
    let image = read_image_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Missing '{IMAGE_FIELD}' field")))?;

    validate_image_payload(&image.bytes)?;

    debug!(
        size_bytes = image.len(),
        content_type = %image.content_type,
        file_name = image.file_name.as_deref().unwrap_or("-"),
        "Forwarding image to analyzer"
    );

    let assessment = state.analyzer.analyze(image).await?;
    Ok(Json(assessment))
}

/// Read the first `image` field, skipping any others.
async fn read_image_field(multipart: &mut Multipart) -> AppResult<Option<ImageUpload>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let content_type = normalize_mime_type(field.content_type());
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            bytes,
        }));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(e.body_text())
    }
}
