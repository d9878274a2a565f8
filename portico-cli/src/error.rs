//! Error types for console commands.

use thiserror::Error;

/// Result type for console operations.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command line
    #[error("{0}")]
    Usage(#[from] clap::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The application could not provide what the command needs
    #[error(transparent)]
    App(#[from] portico_core::Error),
}

impl CliError {
    /// Exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl From<CliError> for portico_core::Error {
    fn from(err: CliError) -> Self {
        match err {
            CliError::App(err) => err,
            CliError::Io(err) => portico_core::Error::Io(err),
            CliError::Usage(err) => portico_core::Error::BadRequest(err.to_string()),
            CliError::Serialization(err) => portico_core::Error::Serialization(err.to_string()),
        }
    }
}
