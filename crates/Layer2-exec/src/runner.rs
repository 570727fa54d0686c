//! Process runner - launches a command, relays its output, classifies the exit
//!
//! Flow per run:
//! 1. build the invocation (hook root prefix for container targets)
//! 2. `exec_start` on the backend for the target
//! 3. relay stdout/stderr into the sinks until the stream ends
//! 4. a single `exec_inspect` for the exit code
//! 5. non-zero exit becomes `bad exit code(<code>): <stderr>`
//!
//! stderr is always recorded so a failure can carry the text the process
//! emitted, whether or not the caller supplied a stderr sink.

use crate::backend::{ExecBackend, LocalBackend};
use crate::command::CommandSpec;
use crate::error::{ExecError, Result};
use crate::relay;
use crate::sink::{CaptureBuffer, Sink, TeeWriter};
use boxctl_foundation::{BoxConfig, DEFAULT_HOOK_ROOT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How a finished command exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    NonZero(i64),
}

impl ExitClass {
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Self::Success
        } else {
            Self::NonZero(code)
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Success => 0,
            Self::NonZero(code) => *code,
        }
    }
}

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Stdout, when the caller supplied no stdout sink
    pub output: String,

    pub exit: ExitClass,

    /// Everything the process wrote to stderr
    pub diagnostics: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit == ExitClass::Success
    }

    /// Turn a non-zero exit into `ExecError::NonZeroExit`
    pub fn into_result(self) -> Result<Self> {
        match self.exit {
            ExitClass::Success => Ok(self),
            ExitClass::NonZero(code) => Err(ExecError::NonZeroExit {
                code,
                stderr: self.diagnostics,
            }),
        }
    }
}

enum Supervised {
    Relayed(std::io::Result<u64>),
    Cancelled,
    TimedOut(Duration),
}

/// Runs `CommandSpec`s against the local host or a container backend
pub struct ProcessRunner {
    local: Arc<dyn ExecBackend>,
    remote: Option<Arc<dyn ExecBackend>>,
    hook_root: String,
}

impl ProcessRunner {
    pub fn new(local: Arc<dyn ExecBackend>) -> Self {
        Self {
            local,
            remote: None,
            hook_root: DEFAULT_HOOK_ROOT.to_string(),
        }
    }

    /// Runner over host processes only
    pub fn local() -> Self {
        Self::new(Arc::new(LocalBackend::new()))
    }

    /// Runner using the hook root from `config`
    pub fn from_config(config: &BoxConfig, local: Arc<dyn ExecBackend>) -> Self {
        Self::new(local).with_hook_root(config.hook_root())
    }

    /// Backend used for commands with a non-empty target
    pub fn with_remote(mut self, remote: Arc<dyn ExecBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_hook_root(mut self, hook_root: impl Into<String>) -> Self {
        self.hook_root = hook_root.into();
        self
    }

    pub fn hook_root(&self) -> &str {
        &self.hook_root
    }

    fn backend_for(&self, cmd: &CommandSpec) -> Result<&Arc<dyn ExecBackend>> {
        if !cmd.is_remote() {
            return Ok(&self.local);
        }
        self.remote.as_ref().ok_or_else(|| {
            ExecError::Launch(format!(
                "no container backend configured for target {}",
                cmd.target
            ))
        })
    }

    /// Run to completion and report how the command exited
    ///
    /// A non-zero exit is not an error here; see [`ProcessRunner::run`].
    pub async fn execute(&self, mut cmd: CommandSpec) -> Result<ExecutionResult> {
        if cmd.path.is_empty() {
            return Err(ExecError::InvalidCommand("empty executable path".to_string()));
        }

        let backend = self.backend_for(&cmd)?;
        let request = cmd.invocation(&self.hook_root);
        debug!(
            "exec: target={:?} path={} payload={} backend={}",
            cmd.target,
            cmd.path,
            cmd.payload,
            backend.name()
        );

        let captured = CaptureBuffer::new();
        let diagnostics = CaptureBuffer::new();
        let mut stdout: Sink = match cmd.stdout.take() {
            Some(sink) => sink,
            None => Box::new(captured.clone()),
        };
        let mut stderr: Sink = match cmd.stderr.take() {
            Some(sink) => Box::new(TeeWriter::new(sink, diagnostics.clone())),
            None => Box::new(diagnostics.clone()),
        };

        let session = backend.exec_start(&request).await?;
        let exec_id = session.id;

        let supervised = {
            let relay = relay::pipe(session.output, Some(&mut stdout), Some(&mut stderr));
            let cancel = cmd.cancel.clone().unwrap_or_default();
            let timeout = cmd.timeout;
            let deadline = async move {
                match timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                relayed = relay => Supervised::Relayed(relayed),
                _ = cancel.cancelled() => Supervised::Cancelled,
                _ = deadline => Supervised::TimedOut(timeout.unwrap_or_default()),
            }
        };

        match supervised {
            Supervised::Relayed(Ok(bytes)) => {
                debug!("exec {}: relayed {} bytes", exec_id, bytes);
            }
            Supervised::Relayed(Err(e)) => {
                release(backend.as_ref(), &exec_id).await;
                return Err(ExecError::Stream(e));
            }
            Supervised::Cancelled => {
                warn!("exec {} cancelled", exec_id);
                release(backend.as_ref(), &exec_id).await;
                return Err(ExecError::Cancelled);
            }
            Supervised::TimedOut(limit) => {
                warn!("exec {} timed out after {:?}", exec_id, limit);
                release(backend.as_ref(), &exec_id).await;
                return Err(ExecError::Timeout(limit));
            }
        }

        // single-shot: relay completion is taken to mean the command finished
        let inspection = backend.exec_inspect(&exec_id).await?;
        let code = inspection
            .exit_code
            .ok_or_else(|| ExecError::ExitStatusUnavailable {
                exec_id: exec_id.clone(),
            })?;

        Ok(ExecutionResult {
            output: captured.contents(),
            exit: ExitClass::from_code(code),
            diagnostics: diagnostics.contents(),
        })
    }

    /// Run to completion; a non-zero exit is an error carrying the stderr text
    pub async fn run(&self, cmd: CommandSpec) -> Result<()> {
        self.execute(cmd).await?.into_result().map(|_| ())
    }

    /// Run and return stdout, mirroring `std::process::Command::output`
    ///
    /// Fails with `StdoutAlreadySet` if the caller already attached a stdout
    /// sink. On failure the error wraps the cause together with whatever
    /// stdout was captured.
    pub async fn output(&self, mut cmd: CommandSpec) -> Result<String> {
        if cmd.stdout.is_some() {
            return Err(ExecError::StdoutAlreadySet);
        }

        let buffer = CaptureBuffer::new();
        cmd.stdout = Some(Box::new(buffer.clone()));
        let (target, path, payload) = (cmd.target.clone(), cmd.path.clone(), cmd.payload.clone());

        match self.run(cmd).await {
            Ok(()) => {
                let output = buffer.contents();
                debug!("exec output: {}", output);
                Ok(output)
            }
            Err(source) => {
                let captured = buffer.contents();
                error!("exec failed: target={:?} path={} payload={}", target, path, payload);
                error!("exec output: {}, err: {}", captured, source);
                Err(ExecError::Command {
                    path,
                    captured,
                    source: Box::new(source),
                })
            }
        }
    }
}

async fn release(backend: &dyn ExecBackend, exec_id: &str) {
    if let Err(e) = backend.exec_cancel(exec_id).await {
        warn!("Failed to release exec {}: {}", exec_id, e);
    }
}
