//! Vagrant runner - drives the vagrant CLI from the app directory
//!
//! Output from both channels is merged into one live feed, indented for the
//! CLI. Banners around the run are the caller's concern.

use crate::backend::{ExecBackend, ExecRequest, LocalBackend};
use crate::error::{ExecError, Result};
use crate::relay::{DisplayRelay, StreamKind};
use crate::sink::CaptureBuffer;
use boxctl_foundation::BoxConfig;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

pub struct VagrantRunner {
    backend: Arc<dyn ExecBackend>,
    vagrant_bin: String,
    app_dir: PathBuf,
    relay: DisplayRelay,
}

impl VagrantRunner {
    pub fn new(
        backend: Arc<dyn ExecBackend>,
        vagrant_bin: impl Into<String>,
        app_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            vagrant_bin: vagrant_bin.into(),
            app_dir: app_dir.into(),
            relay: DisplayRelay::default(),
        }
    }

    /// Runner over host processes, rooted at the configured app directory
    pub fn from_config(config: &BoxConfig) -> boxctl_foundation::Result<Self> {
        Ok(Self::new(
            Arc::new(LocalBackend::new()),
            config.vagrant_bin(),
            config.app_root()?,
        ))
    }

    pub fn with_relay(mut self, relay: DisplayRelay) -> Self {
        self.relay = relay;
        self
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// The command line as shown to the user, e.g. `vagrant up`
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.vagrant_bin.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run `vagrant <args...>` in the app directory, relaying output to `sink`
    pub async fn run<W>(&self, args: &[String], sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let is_dir = tokio::fs::metadata(&self.app_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ExecError::MissingAppDir(self.app_dir.clone()));
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.vagrant_bin.clone());
        argv.extend(args.iter().cloned());
        let request = ExecRequest {
            target: String::new(),
            argv,
            workdir: Some(self.app_dir.clone()),
        };
        debug!("vagrant: {:?} in {}", request.argv, self.app_dir.display());

        let session = self.backend.exec_start(&request).await?;

        let diagnostics = CaptureBuffer::new();
        let tap = diagnostics.clone();
        let output = session
            .output
            .inspect(move |item| {
                if let Ok(chunk) = item {
                    if chunk.kind == StreamKind::Stderr {
                        tap.extend(&chunk.bytes);
                    }
                }
            })
            .boxed();

        if let Err(e) = self.relay.run(output, sink).await {
            if let Err(cancel_err) = self.backend.exec_cancel(&session.id).await {
                warn!("Failed to release exec {}: {}", session.id, cancel_err);
            }
            return Err(ExecError::Stream(e));
        }

        let inspection = self.backend.exec_inspect(&session.id).await?;
        match inspection.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(ExecError::NonZeroExit {
                code,
                stderr: diagnostics.contents(),
            }),
            None => Err(ExecError::ExitStatusUnavailable {
                exec_id: session.id,
            }),
        }
    }
}
