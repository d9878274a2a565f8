// Error types for configuration management

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ConfigError {
    /// Whether the error only says a file is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound(_))
    }
}

impl From<ConfigError> for portico_core::Error {
    fn from(err: ConfigError) -> Self {
        portico_core::Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
