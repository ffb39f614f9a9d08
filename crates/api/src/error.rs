//! Error types for control-plane and data-plane calls.

use thiserror::Error;

/// HTTP status codes worth retrying under a pacer.
const RETRY_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 509];

/// Whether an HTTP status code should be retried.
///
/// The classifier is a pure function of the code; classifying the same
/// response twice yields the same decision.
pub fn retryable_http_status(code: u16) -> bool {
    RETRY_STATUS_CODES.contains(&code)
}

/// Errors surfaced by the remote client.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Transport-level failure (connect, TLS, timeout, non-2xx without envelope).
    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// The envelope carried a non-success application status.
    #[error("remote returned status {status}: {msg}")]
    Status { status: i64, msg: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Whether a pacer should retry the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { retryable, .. } => *retryable,
            ApiError::Status { .. } => false,
            ApiError::Decode { .. } => false,
        }
    }

    /// Transport error constructor for reqwest failures.
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        ApiError::Transport {
            message: message.into(),
            retryable,
        }
    }
}
