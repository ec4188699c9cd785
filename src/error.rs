//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Error taxonomy for the background removal pipeline
///
/// Model-load failures are terminal for the worker that raised them; inference
/// failures are scoped to a single request; supersession is an expected
/// outcome of the single-pending-request policy, not a user-facing failure.
#[derive(Error, Debug)]
pub enum RemovalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Model loading or initialization errors (terminal for the worker)
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Decoding or inference errors for a specific request
    #[error("Inference error: {0}")]
    Inference(String),

    /// The request was pre-empted by a newer one before completion
    #[error("Background removal superseded by a newer request")]
    Superseded,

    /// Worker lifecycle or channel failures (worker thread gone, client dropped)
    #[error("Worker error: {0}")]
    Worker(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote removal API failures (non-2xx status, transport errors)
    #[error("Remote removal error: {0}")]
    Remote(String),
}

impl RemovalError {
    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new worker error
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new remote API error
    pub fn remote<S: Into<String>>(msg: S) -> Self {
        Self::Remote(msg.into())
    }

    /// Whether this error leaves the worker permanently unusable
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ModelLoad(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RemovalError::model_load("backend unavailable");
        assert_eq!(err.to_string(), "Model load error: backend unavailable");

        let err = RemovalError::inference("corrupt image");
        assert_eq!(err.to_string(), "Inference error: corrupt image");

        let err = RemovalError::Superseded;
        assert!(err.to_string().contains("superseded"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(RemovalError::model_load("oom").is_terminal());
        assert!(!RemovalError::inference("bad input").is_terminal());
        assert!(!RemovalError::Superseded.is_terminal());
    }
}
