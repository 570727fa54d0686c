//! Error types for boxctl
//!
//! Shared error taxonomy for every layer above the foundation.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// boxctl error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Execution
    // ========================================================================
    /// The process or remote exec session could not be started
    #[error("Launch error: {0}")]
    Launch(String),

    /// I/O failure while relaying output
    #[error("Stream error: {0}")]
    Stream(String),

    /// The process ran but exited with a non-zero code
    #[error("Command failed: {0}")]
    Command(String),

    /// Caller misuse, nothing was executed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller can reasonably recover (e.g. show the message and continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Command(_) | Error::Timeout(_) | Error::Cancelled | Error::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_is_recoverable() {
        let err = Error::Command("bad exit code(2): boom".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Command failed: bad exit code(2): boom");
    }

    #[test]
    fn test_launch_error_is_fatal() {
        let err = Error::Launch("no such image".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_recoverable());
    }
}
