//! Execution facade - the one-call entry point used by the CLI

use crate::command::{CommandSpec, Payload};
use crate::error::Result;
use crate::runner::ProcessRunner;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Run `operation` on `target` and return its stdout
///
/// An empty `target` runs on the host; otherwise `operation` names a hook in
/// the container. Everything the command writes to stderr streams into
/// `diagnostics` as it arrives. Errors from the runner pass through unchanged.
pub async fn exec<W>(
    runner: &ProcessRunner,
    target: &str,
    operation: &str,
    payload: impl Into<Payload>,
    diagnostics: W,
) -> Result<String>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    runner
        .output(command(target, operation, payload, diagnostics))
        .await
}

/// [`exec`], released early once `cancel` fires
///
/// The exec is cancelled on the backend before the call returns
/// `ExecError::Cancelled` (wrapped in `ExecError::Command`).
pub async fn exec_cancellable<W>(
    runner: &ProcessRunner,
    target: &str,
    operation: &str,
    payload: impl Into<Payload>,
    diagnostics: W,
    cancel: CancellationToken,
) -> Result<String>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let cmd = command(target, operation, payload, diagnostics).with_cancel(cancel);
    runner.output(cmd).await
}

fn command<W>(
    target: &str,
    operation: &str,
    payload: impl Into<Payload>,
    diagnostics: W,
) -> CommandSpec
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    CommandSpec::new(target, operation, payload).with_stderr(diagnostics)
}
