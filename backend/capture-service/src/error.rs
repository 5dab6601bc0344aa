/// Error types for Capture Service
///
/// This module defines all error types that can occur in the capture-service.
/// Errors are converted to the service response envelope for API clients.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ApiResponse;

/// Result type for capture-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Thumbnail codec failures
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to open image {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {}: {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Unsupported image format {format} for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Failed to encode thumbnail for {}: {reason}", .path.display())]
    EncodeFailed { path: PathBuf, reason: String },
}

/// Colorization service failures
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Service answered with a non-success status
    #[error("Synthesis rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// Body missing `data.save_path` or not JSON at all
    #[error("Malformed synthesis response: {0}")]
    MalformedResponse(String),

    /// Service saved somewhere other than where it was asked to
    #[error("Synthesis saved to {returned}, expected {requested}")]
    PathMismatch { requested: String, returned: String },

    /// Transport failure or timeout
    #[error("Synthesis service unavailable: {0}")]
    Unavailable(String),
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Request failed field checks; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File unreadable {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Record write failed; the file it described has been removed
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::FileUnreadable { .. } => "FILE_UNREADABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Codec(CodecError::OpenFailed { .. }) => "OPEN_FAILED",
            AppError::Codec(CodecError::DecodeFailed { .. }) => "DECODE_FAILED",
            AppError::Codec(CodecError::UnsupportedFormat { .. }) => "UNSUPPORTED_FORMAT",
            AppError::Codec(CodecError::EncodeFailed { .. }) => "ENCODE_FAILED",
            AppError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            AppError::Synthesis(SynthesisError::Rejected { .. }) => "SYNTHESIS_REJECTED",
            AppError::Synthesis(SynthesisError::MalformedResponse(_)) => {
                "MALFORMED_SYNTHESIS_RESPONSE"
            }
            AppError::Synthesis(SynthesisError::PathMismatch { .. }) => "SYNTHESIS_PATH_MISMATCH",
            AppError::Synthesis(SynthesisError::Unavailable(_)) => "SYNTHESIS_UNAVAILABLE",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid request parameters",
            AppError::FileUnreadable { .. } => "Image file not found",
            AppError::NotFound(_) => "Resource not found",
            AppError::Codec(_) => "Failed to generate thumbnail",
            AppError::PersistenceFailed(_) => "Failed to save image record",
            AppError::Synthesis(_) => "Color synthesis failed",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal server error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::FileUnreadable { .. } | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Codec(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PersistenceFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Synthesis(SynthesisError::Unavailable(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Synthesis(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = ApiResponse::error(
            status.as_u16(),
            self.summary(),
            self.kind(),
            self.to_string(),
        );
        HttpResponse::build(status).json(body)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
