//! Error types for session and cookie operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session expired
    #[error("Session expired: {0}")]
    Expired(String),

    /// The request does not match the client the session was created for
    #[error("Session validation failed: {0}")]
    Validation(String),

    /// Session used before it was started
    #[error("Session not started")]
    NotStarted,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cookie value could not be encrypted or decrypted
    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Storage backend error
    #[error("Session store error: {0}")]
    Store(String),
}

impl From<SessionError> for portico_core::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(msg) => portico_core::Error::SessionValidation(msg),
            SessionError::Config(msg) => portico_core::Error::Config(msg),
            SessionError::Cookie(msg) => portico_core::Error::BadRequest(msg),
            other => portico_core::Error::Internal(other.to_string()),
        }
    }
}
