//! Error types for command execution and status probing
//!
//! `ExecError` keeps the detail the CLI needs (exit code, captured
//! diagnostics) and converts into `boxctl_foundation::Error` at the layer
//! boundary.

use boxctl_foundation::Error as FoundationError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    /// The process or remote exec session could not be started
    #[error("{0}")]
    Launch(String),

    /// I/O failure while relaying output
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    /// The command ran and exited with a non-zero code
    #[error("bad exit code({code}): {stderr}")]
    NonZeroExit { code: i64, stderr: String },

    /// `output()` was called on a command that already has a stdout sink
    #[error("exec: Stdout is already set")]
    StdoutAlreadySet,

    /// The command is unusable (empty path)
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The exit status query itself failed
    #[error("failed to inspect exec {exec_id}: {message}")]
    Inspect { exec_id: String, message: String },

    /// The backend reported no exit code after the output stream closed
    #[error("exit status unavailable for exec {exec_id}")]
    ExitStatusUnavailable { exec_id: String },

    /// Inspect or cancel was called for an exec id the backend does not track
    #[error("unknown exec session: {0}")]
    UnknownExec(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command cancelled")]
    Cancelled,

    /// A captured-output run failed; `captured` holds whatever stdout was read
    #[error("{path}: {source}")]
    Command {
        path: String,
        captured: String,
        source: Box<ExecError>,
    },

    /// The machine identity file exists but could not be read
    #[error("failed to read machine identity {path}: {source}")]
    Identity { path: PathBuf, source: io::Error },

    #[error("app directory {0} does not exist")]
    MissingAppDir(PathBuf),
}

impl ExecError {
    /// Exit code of a non-zero exit, looking through `Command` wrappers
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            Self::Command { source, .. } => source.exit_code(),
            _ => None,
        }
    }

    /// Stdout captured before a failed `output()` run
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::Command { captured, .. } => Some(captured),
            _ => None,
        }
    }

    /// Diagnostic text the failing process wrote to stderr
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            Self::Command { source, .. } => source.diagnostics(),
            _ => None,
        }
    }

    /// Whether the caller misused the API (nothing was executed)
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::StdoutAlreadySet | Self::InvalidCommand(_))
    }

    pub(crate) fn launch(program: &str, err: impl std::fmt::Display) -> Self {
        Self::Launch(format!("{}: {}", program, err))
    }
}

// ============================================================================
// boxctl_foundation::Error conversion
// ============================================================================

impl From<ExecError> for FoundationError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Launch(msg) => FoundationError::Launch(msg),
            ExecError::Stream(e) => FoundationError::Stream(e.to_string()),
            e @ ExecError::NonZeroExit { .. } => FoundationError::Command(e.to_string()),
            e @ ExecError::Command { .. } => FoundationError::Command(e.to_string()),
            e @ (ExecError::StdoutAlreadySet | ExecError::InvalidCommand(_)) => {
                FoundationError::InvalidInput(e.to_string())
            }
            ExecError::Timeout(d) => FoundationError::Timeout(format!("{:?}", d)),
            ExecError::Cancelled => FoundationError::Cancelled,
            ExecError::Identity { path, source } => {
                FoundationError::Storage(format!("{}: {}", path.display(), source))
            }
            ExecError::MissingAppDir(path) => {
                FoundationError::Config(format!("app directory {} does not exist", path.display()))
            }
            e @ (ExecError::Inspect { .. }
            | ExecError::ExitStatusUnavailable { .. }
            | ExecError::UnknownExec(_)) => {
                FoundationError::Internal(e.to_string())
            }
        }
    }
}
