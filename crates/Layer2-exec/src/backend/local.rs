//! Local backend - runs programs directly on the host
//!
//! Children are tracked by exec id between `exec_start` and `exec_inspect`;
//! inspecting waits for the child and releases it.

use crate::backend::{ExecBackend, ExecInspection, ExecRequest, ExecSession};
use crate::error::{ExecError, Result};
use crate::relay;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Exit code reported for a child terminated by a signal
pub const SIGNALED_EXIT_CODE: i64 = -1;

/// Backend that spawns host processes
pub struct LocalBackend {
    /// Running children by exec id
    processes: Arc<Mutex<HashMap<String, Child>>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            processes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Exec ids that have been started but not inspected
    pub async fn running(&self) -> Vec<String> {
        self.processes.lock().await.keys().cloned().collect()
    }

    async fn take(&self, exec_id: &str) -> Result<Child> {
        self.processes
            .lock()
            .await
            .remove(exec_id)
            .ok_or_else(|| ExecError::UnknownExec(exec_id.to_string()))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecBackend for LocalBackend {
    async fn exec_start(&self, request: &ExecRequest) -> Result<ExecSession> {
        let program = request.program();
        if program.is_empty() {
            return Err(ExecError::InvalidCommand("empty program".to_string()));
        }

        let mut cmd = Command::new(program);
        cmd.args(&request.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &request.workdir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ExecError::launch(program, e))?;

        let output = relay::merge(child.stdout.take(), child.stderr.take());
        let id = Uuid::new_v4().to_string();
        debug!("Started local exec {} (pid {:?}): {:?}", id, child.id(), request.argv);

        self.processes.lock().await.insert(id.clone(), child);

        Ok(ExecSession { id, output })
    }

    async fn exec_inspect(&self, exec_id: &str) -> Result<ExecInspection> {
        let mut child = self.take(exec_id).await?;

        let status = child.wait().await.map_err(|e| ExecError::Inspect {
            exec_id: exec_id.to_string(),
            message: e.to_string(),
        })?;

        let code = status.code().map(i64::from).unwrap_or(SIGNALED_EXIT_CODE);
        debug!("Local exec {} exited with {}", exec_id, code);

        Ok(ExecInspection::exited(code))
    }

    async fn exec_cancel(&self, exec_id: &str) -> Result<()> {
        let mut child = self.take(exec_id).await?;
        child.kill().await.map_err(|e| ExecError::Inspect {
            exec_id: exec_id.to_string(),
            message: format!("failed to kill process: {}", e),
        })?;
        info!("Killed local exec {}", exec_id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sink::CaptureBuffer;

    fn sh(script: &str) -> ExecRequest {
        ExecRequest {
            target: String::new(),
            argv: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            workdir: None,
        }
    }

    #[tokio::test]
    async fn test_local_backend() {
        let backend = LocalBackend::new();
        assert!(backend.is_available());
        assert_eq!(backend.name(), "local");
        assert!(backend.running().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_relay_inspect() {
        let backend = LocalBackend::new();
        let session = backend
            .exec_start(&sh("echo hello; echo oops >&2; exit 4"))
            .await
            .unwrap();

        let out = CaptureBuffer::new();
        let err = CaptureBuffer::new();
        relay::pipe(session.output, Some(&mut out.clone()), Some(&mut err.clone()))
            .await
            .unwrap();

        let inspection = backend.exec_inspect(&session.id).await.unwrap();
        assert_eq!(inspection, ExecInspection::exited(4));
        assert_eq!(out.contents(), "hello\n");
        assert_eq!(err.contents(), "oops\n");
        assert!(backend.running().await.is_empty());
    }

    #[tokio::test]
    async fn test_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = sh("pwd");
        request.workdir = Some(dir.path().to_path_buf());

        let backend = LocalBackend::new();
        let session = backend.exec_start(&request).await.unwrap();
        let out = CaptureBuffer::new();
        relay::pipe(session.output, Some(&mut out.clone()), None::<&mut Vec<u8>>)
            .await
            .unwrap();
        backend.exec_inspect(&session.id).await.unwrap();

        let printed = std::path::PathBuf::from(out.contents().trim());
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let backend = LocalBackend::new();
        let request = ExecRequest {
            target: String::new(),
            argv: vec!["definitely-not-a-real-binary-7f3e".to_string()],
            workdir: None,
        };

        let result = backend.exec_start(&request).await;
        assert!(matches!(result, Err(ExecError::Launch(msg)) if msg.starts_with("definitely-not")));
    }

    #[tokio::test]
    async fn test_inspect_unknown() {
        let backend = LocalBackend::new();
        let result = backend.exec_inspect("nope").await;
        assert!(matches!(result, Err(ExecError::UnknownExec(_))));
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let backend = LocalBackend::new();
        let session = backend.exec_start(&sh("sleep 30")).await.unwrap();

        backend.exec_cancel(&session.id).await.unwrap();
        assert!(backend.running().await.is_empty());
    }
}
