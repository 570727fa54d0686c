//! Command definition

use crate::backend::ExecRequest;
use crate::sink::Sink;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Arguments appended after the executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// One argument, passed even when empty
    Single(String),
    /// Ordered argument list
    Args(Vec<String>),
}

impl Payload {
    pub fn none() -> Self {
        Self::Args(Vec::new())
    }

    fn append_to(&self, argv: &mut Vec<String>) {
        match self {
            Self::Single(arg) => argv.push(arg.clone()),
            Self::Args(args) => argv.extend(args.iter().cloned()),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(arg) => write!(f, "{}", arg),
            Self::Args(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

impl From<&str> for Payload {
    fn from(arg: &str) -> Self {
        Self::Single(arg.to_string())
    }
}

impl From<String> for Payload {
    fn from(arg: String) -> Self {
        Self::Single(arg)
    }
}

impl From<Vec<String>> for Payload {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

impl From<&[&str]> for Payload {
    fn from(args: &[&str]) -> Self {
        Self::Args(args.iter().map(|a| a.to_string()).collect())
    }
}

/// A command to run locally or inside a container
///
/// An empty `target` runs `path` on the host; otherwise `target` names the
/// container and `path` is resolved under the hook root. A command is built by
/// one owner and moved into the runner, which consumes it.
pub struct CommandSpec {
    /// Container id, or empty for the local host
    pub target: String,

    /// Executable, relative to the hook root for container targets
    pub path: String,

    pub payload: Payload,

    pub stdout: Option<Sink>,

    pub stderr: Option<Sink>,

    /// Working directory (local runs only)
    pub workdir: Option<PathBuf>,

    pub timeout: Option<Duration>,

    pub cancel: Option<CancellationToken>,
}

impl CommandSpec {
    pub fn new(
        target: impl Into<String>,
        path: impl Into<String>,
        payload: impl Into<Payload>,
    ) -> Self {
        Self {
            target: target.into(),
            path: path.into(),
            payload: payload.into(),
            stdout: None,
            stderr: None,
            workdir: None,
            timeout: None,
            cancel: None,
        }
    }

    /// Command for the local host
    pub fn local(path: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::new(String::new(), path, payload)
    }

    /// Command for a hook inside the container `target`
    pub fn remote(
        target: impl Into<String>,
        path: impl Into<String>,
        payload: impl Into<Payload>,
    ) -> Self {
        Self::new(target, path, payload)
    }

    pub fn with_stdout(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    pub fn with_stderr(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(sink));
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_remote(&self) -> bool {
        !self.target.is_empty()
    }

    /// Fully-qualified invocation for the backend
    pub fn invocation(&self, hook_root: &str) -> ExecRequest {
        let program = if self.is_remote() {
            format!(
                "{}/{}",
                hook_root.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        } else {
            self.path.clone()
        };

        let mut argv = vec![program];
        self.payload.append_to(&mut argv);

        ExecRequest {
            target: self.target.clone(),
            argv,
            workdir: self.workdir.clone(),
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("target", &self.target)
            .field("path", &self.path)
            .field("payload", &self.payload)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("workdir", &self.workdir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_invocation_uses_hook_root() {
        let cmd = CommandSpec::remote("3f2a9c", "configure", "{\"env\":\"dev\"}");
        let req = cmd.invocation("/opt/nanobox/hooks");

        assert_eq!(req.target, "3f2a9c");
        assert_eq!(
            req.argv,
            vec!["/opt/nanobox/hooks/configure", "{\"env\":\"dev\"}"]
        );
    }

    #[test]
    fn test_remote_invocation_normalizes_slashes() {
        let cmd = CommandSpec::remote("c1", "/build", Payload::none());
        let req = cmd.invocation("/hooks/");
        assert_eq!(req.argv, vec!["/hooks/build"]);
    }

    #[test]
    fn test_local_invocation_keeps_path() {
        let cmd = CommandSpec::local("vagrant", vec!["up".to_string(), "--provision".to_string()])
            .with_workdir("/srv/app");
        let req = cmd.invocation("/opt/nanobox/hooks");

        assert!(req.target.is_empty());
        assert_eq!(req.argv, vec!["vagrant", "up", "--provision"]);
        assert_eq!(req.workdir, Some(PathBuf::from("/srv/app")));
    }

    #[test]
    fn test_empty_single_payload_is_passed() {
        let cmd = CommandSpec::remote("c1", "sync", "");
        let req = cmd.invocation("/h");
        assert_eq!(req.argv, vec!["/h/sync", ""]);
    }

    #[test]
    fn test_debug_hides_sinks() {
        let cmd = CommandSpec::local("true", Payload::none()).with_stdout(Vec::new());
        let rendered = format!("{:?}", cmd);
        assert!(rendered.contains("stdout: true"));
        assert!(rendered.contains("stderr: false"));
    }
}
