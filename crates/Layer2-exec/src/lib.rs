//! # boxctl-exec
//!
//! Process execution and status inference for boxctl.
//!
//! ## Features
//!
//! - Command execution on the host or inside a container (Docker exec)
//! - Live stdout/stderr relay with bounded producer/consumer channels
//! - Captured-output runs with `bad exit code(N)` diagnostics
//! - VM status probing through `vagrant global-status`
//! - Cancellation and timeouts for every run

pub mod backend;
pub mod command;
pub mod error;
pub mod facade;
pub mod prober;
pub mod relay;
pub mod runner;
pub mod sink;
pub mod status;
pub mod vagrant;

#[cfg(test)]
mod testing;

// Execution
pub use backend::{DockerBackend, ExecBackend, ExecInspection, ExecRequest, ExecSession, LocalBackend};
pub use command::{CommandSpec, Payload};
pub use error::{ExecError, Result};
pub use facade::{exec, exec_cancellable};
pub use runner::{ExecutionResult, ExitClass, ProcessRunner};

// Output relay
pub use relay::{Chunk, ChunkStream, DisplayRelay, LineBreakStyle, LineSplitter, StreamKind};
pub use sink::{CaptureBuffer, Sink};

// Status
pub use prober::{FileIdentityResolver, IdentityResolver, MachineTarget, StatusProber};
pub use status::{KeywordClassifier, MachineStatus, StatusClassifier};

// Vagrant
pub use vagrant::VagrantRunner;

// Cancellation token accepted by `CommandSpec::with_cancel` and `exec_cancellable`
pub use tokio_util::sync::CancellationToken;
