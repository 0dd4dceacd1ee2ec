use crate::error::{AppError, AppResult};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// MIME type assumed when the client declares none (or a non-image one).
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Maximum accepted length of a declared MIME type.
const MAX_MIME_TYPE_LENGTH: usize = 127;

/// Reject empty uploads before anything is forwarded to the analyzer.
pub fn validate_image_payload(bytes: &[u8]) -> AppResult<()> {
    if bytes.is_empty() {
        return Err(AppError::EmptyPayload);
    }
    Ok(())
}

/// Pick the MIME type to forward to the analyzer.
///
/// Declared `image/*` types are kept (lower-cased, parameters stripped);
/// anything else falls back to [`DEFAULT_IMAGE_MIME_TYPE`].
pub fn normalize_mime_type(declared: Option<&str>) -> String {
    declared
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| {
            ct.len() <= MAX_MIME_TYPE_LENGTH
                && ct
                    .strip_prefix("image/")
                    .is_some_and(|sub| !sub.is_empty() && sub.bytes().all(is_token_byte))
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME_TYPE.to_string())
}

/// RFC 7230 token characters (the subset that appears in MIME subtypes).
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            validate_image_payload(&[]),
            Err(AppError::EmptyPayload)
        ));
    }

    #[test]
    fn test_non_empty_payload_accepted() {
        assert!(validate_image_payload(&[0x89, 0x50, 0x4e, 0x47]).is_ok());
    }

    #[test]
    fn test_image_types_preserved() {
        assert_eq!(normalize_mime_type(Some("image/png")), "image/png");
        assert_eq!(normalize_mime_type(Some("image/webp")), "image/webp");
        assert_eq!(normalize_mime_type(Some("IMAGE/GIF")), "image/gif");
    }

    #[test]
    fn test_parameters_stripped() {
        assert_eq!(
            normalize_mime_type(Some("image/jpeg; charset=binary")),
            "image/jpeg"
        );
    }

    #[test]
    fn test_fallback_to_jpeg() {
        assert_eq!(normalize_mime_type(None), "image/jpeg");
        assert_eq!(
            normalize_mime_type(Some("application/octet-stream")),
            "image/jpeg"
        );
        assert_eq!(normalize_mime_type(Some("image/")), "image/jpeg");
        assert_eq!(normalize_mime_type(Some("image/p ng")), "image/jpeg");
        assert_eq!(normalize_mime_type(Some("")), "image/jpeg");
    }
}
