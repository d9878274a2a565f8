// Error types for the Portico kernel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Session validation failed: {0}")]
    SessionValidation(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Url generation failed: {0}")]
    Url(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Unresolvable parameter: {0}")]
    UnresolvableParameter(String),

    #[error("Boot error: {0}")]
    Boot(String),

    #[error("Circular boot dependency: {0}")]
    CircularBoot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status an unhandled error of this kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) | Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::InvalidSignature(_)
            | Error::SessionValidation(_)
            | Error::InvalidToken(_)
            | Error::Forbidden(_) => 403,
            Error::BadRequest(_) | Error::Deserialization(_) => 400,
            Error::Unauthorized(_) => 401,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
