//! Error types for the gdrive_toolkit crate.

use thiserror::Error;

use crate::models::ApiErrorResponse;

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("No files matched pattern: {0}")]
    NoFilesMatched(String),

    #[error("Glob pattern error: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Zip archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Missing environment variable or secret: {0}")]
    MissingEnvVar(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error(
        "'{0}' not found. Download OAuth 2.0 credentials from Google Cloud Console:\n\
         1. Go to https://console.cloud.google.com/\n\
         2. Create/select a project\n\
         3. Enable Google Drive API\n\
         4. Create OAuth 2.0 credentials (Desktop app)\n\
         5. Download and save as '{0}'"
    )]
    MissingClientSecrets(String),
}

impl DriveError {
    /// Build an `ApiError` from a failed response body, preferring Google's
    /// `{"error": {"code", "message"}}` envelope when present.
    pub fn from_api_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(api_error) => DriveError::ApiError {
                status: api_error.error.code,
                message: api_error.error.message,
            },
            Err(_) => DriveError::ApiError {
                status,
                message: body.to_string(),
            },
        }
    }

    /// True for a 404 coming back from the API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::ApiError { status: 404, .. })
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_body_with_google_envelope() {
        let body = r#"{"error": {"code": 403, "message": "Insufficient permissions"}}"#;
        match DriveError::from_api_body(500, body) {
            DriveError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Insufficient permissions");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_body_plain_text() {
        let err = DriveError::from_api_body(502, "Bad Gateway");
        assert!(matches!(err, DriveError::ApiError { status: 502, .. }));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn not_found_detection() {
        assert!(DriveError::from_api_body(404, "").is_not_found());
        assert!(!DriveError::InvalidArgument("x".into()).is_not_found());
    }
}
