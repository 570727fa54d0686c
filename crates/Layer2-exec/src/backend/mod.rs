//! Exec backends
//!
//! - `LocalBackend` - host processes through `tokio::process`
//! - `DockerBackend` - commands inside a running container via the Docker exec API

pub mod docker;
pub mod local;
pub mod r#trait;

pub use docker::DockerBackend;
pub use local::{LocalBackend, SIGNALED_EXIT_CODE};
pub use r#trait::{ExecBackend, ExecInspection, ExecRequest, ExecSession};
