//! Common error types for CoachSync.

use thiserror::Error;

/// Top-level error type for CoachSync operations.
///
/// The type is `Clone` so a single outcome can be fanned out to every
/// caller coalesced onto one in-flight request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The session token is missing, expired, or rejected.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A remote request exceeded its deadline.
    #[error("Network timeout")]
    NetworkTimeout,

    /// The remote host could not be reached.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The remote rejected the request (validation, 4xx).
    #[error("Remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The remote failed transiently (5xx).
    #[error("Remote unavailable ({status})")]
    RemoteUnavailable { status: u16 },

    /// A durable snapshot could not be parsed.
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Local storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Maximum length for remote error bodies carried in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl Error {
    /// Map an HTTP status and response body to the error taxonomy.
    ///
    /// 401/403 are authentication failures, other 4xx are terminal
    /// rejections, and 5xx are transient server faults.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Error::NotAuthenticated,
            500..=599 => Error::RemoteUnavailable { status },
            _ => Error::RemoteRejected {
                status,
                message: truncate_body(body),
            },
        }
    }

    /// Whether the queue's backoff policy should retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NetworkTimeout
                | Error::NetworkUnreachable(_)
                | Error::RemoteUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Truncate a response body to avoid carrying excessive data in errors.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX_ERROR_BODY_LENGTH)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
