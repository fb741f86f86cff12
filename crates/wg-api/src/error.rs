//! API error types.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use wg_media::MediaError;
use wg_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

static HIDE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Replace unexpected error detail with a generic message in responses.
///
/// Set once at startup from [`ApiConfig::is_production`].
///
/// [`ApiConfig::is_production`]: crate::config::ApiConfig::is_production
pub fn hide_internal_details(hide: bool) {
    HIDE_INTERNAL_DETAILS.store(hide, Ordering::Relaxed);
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Model offline")]
    ModelUnavailable,

    #[error("Video encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0}")]
    Media(MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::ModelUnavailable(_) => Self::ModelUnavailable,
            MediaError::EncoderUnavailable(msg) => Self::EncoderUnavailable(msg),
            other => Self::Media(other),
        }
    }
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            // Corrupt media is reported as a processing failure
            ApiError::ModelUnavailable
            | ApiError::EncoderUnavailable(_)
            | ApiError::Internal(_)
            | ApiError::Media(_)
            | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Failures whose detail stays server-side in production.
    fn is_unexpected(&self) -> bool {
        match self {
            ApiError::Internal(_) | ApiError::Storage(_) => true,
            ApiError::Media(e) => !e.is_client_error(),
            _ => false,
        }
    }

    fn public_message(&self, hide_internal: bool) -> String {
        if hide_internal && self.is_unexpected() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = ?self, status = status.as_u16(), "Request failed");
        }

        // Don't expose internal error details in production
        let message = self.public_message(HIDE_INTERNAL_DETAILS.load(Ordering::Relaxed));

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
