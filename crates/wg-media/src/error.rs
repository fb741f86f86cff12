//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during detection and media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Video encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Frame encoding failed: {0}")]
    EncodeFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a model-unavailable error.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an invalid input error (corrupt media, bad parameters).
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an encoder-unavailable error.
    pub fn encoder_unavailable(message: impl Into<String>) -> Self {
        Self::EncoderUnavailable(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }

    /// Create a frame encoding failure error.
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for failures caused by the request's own input.
    ///
    /// Their message is safe to show the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MediaError::InvalidInput(_))
    }
}
