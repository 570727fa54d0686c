//! Config - settings management
//!
//! - `boxctl.rs` - BoxConfig merged settings

mod boxctl;

pub use boxctl::{
    BoxConfig, DockerConfig, BOX_CONFIG_FILE, DEFAULT_HOOK_ROOT, DEFAULT_PROVIDER,
    DEFAULT_VAGRANT_BIN,
};
