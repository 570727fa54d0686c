//! Status prober - infers the VM state from `vagrant global-status`
//!
//! The machine identity comes from the file vagrant writes when it creates a
//! machine. Its 7-character short form is what `global-status` prints in the
//! first column; every line starting with it is classified and the last
//! recognizable state wins.
//!
//! The current task forwards stdout lines over a bounded channel to a scan
//! task that owns the status and hands it back through its `JoinHandle`.

use crate::backend::{ExecBackend, ExecRequest, LocalBackend};
use crate::error::{ExecError, Result};
use crate::relay::{ChunkStream, LineSplitter, StreamKind, RELAY_CHANNEL_CAPACITY};
use crate::status::{KeywordClassifier, MachineStatus, StatusClassifier};
use async_trait::async_trait;
use boxctl_foundation::{BoxConfig, DEFAULT_VAGRANT_BIN};
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Length of the identity prefix shown by `vagrant global-status`
pub const SHORT_ID_LEN: usize = 7;

const IDENTITY_FILE: &str = "index_uuid";

/// Which machine to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineTarget {
    pub app_root: PathBuf,
    pub app_name: String,
    pub provider: String,
}

impl MachineTarget {
    pub fn new(
        app_root: impl Into<PathBuf>,
        app_name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            app_root: app_root.into(),
            app_name: app_name.into(),
            provider: provider.into(),
        }
    }

    pub fn from_config(config: &BoxConfig) -> boxctl_foundation::Result<Self> {
        Ok(Self::new(
            config.app_root()?,
            config.app_name()?,
            config.provider(),
        ))
    }

    /// `<app_root>/.vagrant/machines/<app_name>/<provider>/index_uuid`
    pub fn identity_path(&self) -> PathBuf {
        self.app_root
            .join(".vagrant")
            .join("machines")
            .join(&self.app_name)
            .join(&self.provider)
            .join(IDENTITY_FILE)
    }
}

/// Looks up the persistent identifier of a machine
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` when no machine has been created
    async fn resolve(&self, target: &MachineTarget) -> Result<Option<String>>;
}

/// Reads the identity file vagrant keeps under the app directory
#[derive(Debug, Clone, Copy, Default)]
pub struct FileIdentityResolver;

#[async_trait]
impl IdentityResolver for FileIdentityResolver {
    async fn resolve(&self, target: &MachineTarget) -> Result<Option<String>> {
        read_identity(&target.identity_path()).await
    }
}

async fn read_identity(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let id = content.trim();
            if id.is_empty() {
                Ok(None)
            } else {
                Ok(Some(id.to_string()))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ExecError::Identity {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// First `SHORT_ID_LEN` characters of an identifier
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Probes machine state through the vagrant CLI
pub struct StatusProber {
    backend: Arc<dyn ExecBackend>,
    resolver: Arc<dyn IdentityResolver>,
    classifier: Arc<dyn StatusClassifier>,
    vagrant_bin: String,
}

impl StatusProber {
    pub fn new(backend: Arc<dyn ExecBackend>) -> Self {
        Self {
            backend,
            resolver: Arc::new(FileIdentityResolver),
            classifier: Arc::new(KeywordClassifier::new()),
            vagrant_bin: DEFAULT_VAGRANT_BIN.to_string(),
        }
    }

    /// Prober over host processes using the configured vagrant binary
    pub fn from_config(config: &BoxConfig) -> Self {
        Self::new(Arc::new(LocalBackend::new())).with_vagrant_bin(config.vagrant_bin())
    }

    pub fn with_vagrant_bin(mut self, bin: impl Into<String>) -> Self {
        self.vagrant_bin = bin.into();
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StatusClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Current state of `target`'s machine
    ///
    /// Returns `Unknown` without launching anything when no identity is
    /// recorded. A failed launch or a non-zero exit of the status command is
    /// an error.
    pub async fn probe(&self, target: &MachineTarget) -> Result<MachineStatus> {
        let resolved = self.resolver.resolve(target).await?;
        let Some(id) = resolved.filter(|id| !id.trim().is_empty()) else {
            debug!("No machine identity at {}", target.identity_path().display());
            return Ok(MachineStatus::Unknown);
        };
        let short = short_id(&id).to_string();

        let request = ExecRequest {
            target: String::new(),
            argv: vec![self.vagrant_bin.clone(), "global-status".to_string()],
            workdir: None,
        };
        debug!("probe: {:?} for machine {}", request.argv, short);
        let session = self.backend.exec_start(&request).await?;

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        let scanner = tokio::spawn(scan(rx, short, self.classifier.clone()));
        let fed = feed_lines(session.output, tx).await;
        let status = scanner
            .await
            .map_err(|e| ExecError::Stream(io::Error::other(format!("scan task failed: {}", e))))?;

        let diagnostics = match fed {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                if let Err(cancel_err) = self.backend.exec_cancel(&session.id).await {
                    warn!("Failed to release exec {}: {}", session.id, cancel_err);
                }
                return Err(ExecError::Stream(e));
            }
        };

        let inspection = self.backend.exec_inspect(&session.id).await?;
        match inspection.exit_code {
            Some(0) => {
                debug!("probe: machine status {:?}", status);
                Ok(status)
            }
            Some(code) => Err(ExecError::NonZeroExit {
                code,
                stderr: diagnostics,
            }),
            None => Err(ExecError::ExitStatusUnavailable {
                exec_id: session.id,
            }),
        }
    }
}

/// Send every stdout line to the scanner; returns the collected stderr text
async fn feed_lines(mut output: ChunkStream, tx: mpsc::Sender<String>) -> io::Result<String> {
    let mut splitter = LineSplitter::new();
    let mut stderr = Vec::new();

    while let Some(item) = output.next().await {
        let chunk = item?;
        match chunk.kind {
            StreamKind::Stdout => {
                for line in splitter.push(&chunk.bytes) {
                    if tx.send(line).await.is_err() {
                        return Ok(String::from_utf8_lossy(&stderr).into_owned());
                    }
                }
            }
            StreamKind::Stderr => stderr.extend_from_slice(&chunk.bytes),
        }
    }

    if let Some(line) = splitter.finish() {
        let _ = tx.send(line).await;
    }
    Ok(String::from_utf8_lossy(&stderr).into_owned())
}

async fn scan(
    mut lines: mpsc::Receiver<String>,
    short_id: String,
    classifier: Arc<dyn StatusClassifier>,
) -> MachineStatus {
    let mut status = MachineStatus::Unknown;
    while let Some(line) = lines.recv().await {
        if let Some(rest) = line.strip_prefix(short_id.as_str()) {
            if let Some(found) = classifier.classify(rest) {
                status = found;
            }
        }
    }
    status
}
