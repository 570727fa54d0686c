//! Docker backend - runs commands inside an existing container
//!
//! Maps the exec triad onto the Docker exec API: `create_exec` +
//! `start_exec` (attached) to start, the attached log stream as output, and
//! `inspect_exec` for the exit code.

use crate::backend::{ExecBackend, ExecInspection, ExecRequest, ExecSession};
use crate::error::{ExecError, Result};
use crate::relay::{Chunk, ChunkStream};
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::Docker;
use boxctl_foundation::DockerConfig;
use futures::stream::{self, StreamExt};
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Backend that execs into containers through the Docker API
pub struct DockerBackend {
    docker: Docker,

    /// Whether the daemon answered a ping at connect time
    available: bool,
}

impl DockerBackend {
    /// Connect with local defaults (socket or `DOCKER_HOST`) and ping the daemon
    pub async fn connect(config: &DockerConfig) -> Result<Self> {
        let mut docker =
            Docker::connect_with_local_defaults().map_err(|e| ExecError::launch("docker", e))?;

        if let Some(secs) = config.timeout_secs {
            docker = docker.with_timeout(Duration::from_secs(secs));
        }

        let available = docker.ping().await.is_ok();
        if !available {
            warn!("Docker daemon did not answer ping");
        }

        Ok(Self { docker, available })
    }

    /// Wrap an existing client
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            available: true,
        }
    }
}

fn chunk_from_log(
    item: std::result::Result<LogOutput, bollard::errors::Error>,
) -> Option<io::Result<Chunk>> {
    match item {
        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
            Some(Ok(Chunk::stdout(message.to_vec())))
        }
        Ok(LogOutput::StdErr { message }) => Some(Ok(Chunk::stderr(message.to_vec()))),
        Ok(LogOutput::StdIn { .. }) => None,
        Err(e) => Some(Err(io::Error::other(e))),
    }
}

#[async_trait]
impl ExecBackend for DockerBackend {
    async fn exec_start(&self, request: &ExecRequest) -> Result<ExecSession> {
        if request.program().is_empty() {
            return Err(ExecError::InvalidCommand("empty program".to_string()));
        }

        let options = CreateExecOptions {
            cmd: Some(request.argv.clone()),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&request.target, options)
            .await
            .map_err(|e| ExecError::launch(&request.target, e))?;

        let started = self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await
            .map_err(|e| ExecError::launch(&request.target, e))?;

        debug!(
            "Started docker exec {} in {}: {:?}",
            exec.id, request.target, request.argv
        );

        let output: ChunkStream = match started {
            StartExecResults::Attached { output, .. } => output
                .filter_map(|item| async move { chunk_from_log(item) })
                .boxed(),
            StartExecResults::Detached => stream::empty().boxed(),
        };

        Ok(ExecSession {
            id: exec.id,
            output,
        })
    }

    async fn exec_inspect(&self, exec_id: &str) -> Result<ExecInspection> {
        let inspect = self
            .docker
            .inspect_exec(exec_id)
            .await
            .map_err(|e| ExecError::Inspect {
                exec_id: exec_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(ExecInspection {
            exit_code: inspect.exit_code,
            running: inspect.running.unwrap_or(false),
        })
    }

    async fn exec_cancel(&self, exec_id: &str) -> Result<()> {
        // the exec API has no kill; dropping the attached stream detaches us
        warn!("Detached from docker exec {} without stopping it", exec_id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_mapping() {
        let out = chunk_from_log(Ok(LogOutput::StdOut {
            message: "hi".into(),
        }));
        assert_eq!(out.unwrap().unwrap(), Chunk::stdout("hi"));

        let err = chunk_from_log(Ok(LogOutput::StdErr {
            message: "bad".into(),
        }));
        assert_eq!(err.unwrap().unwrap(), Chunk::stderr("bad"));

        let tty = chunk_from_log(Ok(LogOutput::Console {
            message: "tty".into(),
        }));
        assert_eq!(tty.unwrap().unwrap(), Chunk::stdout("tty"));

        assert!(chunk_from_log(Ok(LogOutput::StdIn {
            message: "in".into(),
        }))
        .is_none());
    }
}
