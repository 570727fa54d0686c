//! Exec backend trait

use crate::error::Result;
use crate::relay::ChunkStream;
use async_trait::async_trait;
use std::path::PathBuf;

/// Fully-qualified invocation handed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Container id, empty for the local host
    pub target: String,

    /// Program followed by its arguments
    pub argv: Vec<String>,

    pub workdir: Option<PathBuf>,
}

impl ExecRequest {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// A started execution with its attached output
pub struct ExecSession {
    pub id: String,
    pub output: ChunkStream,
}

/// Result of inspecting an execution after its output closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecInspection {
    /// `None` when the backend has not recorded an exit yet
    pub exit_code: Option<i64>,
    pub running: bool,
}

impl ExecInspection {
    pub fn exited(code: i64) -> Self {
        Self {
            exit_code: Some(code),
            running: false,
        }
    }
}

/// Start/attach/inspect triad - implement to add an execution context
#[async_trait]
pub trait ExecBackend: Send + Sync {
    /// Start `request` and attach to its stdout and stderr (never stdin)
    async fn exec_start(&self, request: &ExecRequest) -> Result<ExecSession>;

    /// Query the exit status of a started execution
    async fn exec_inspect(&self, exec_id: &str) -> Result<ExecInspection>;

    /// Stop waiting for an execution and release it
    async fn exec_cancel(&self, exec_id: &str) -> Result<()>;

    /// Check if the backend can be used
    fn is_available(&self) -> bool;

    /// Get backend name
    fn name(&self) -> &'static str;
}
