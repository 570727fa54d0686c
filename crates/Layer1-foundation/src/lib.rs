//! # boxctl-foundation
//!
//! Foundation layer for boxctl:
//! - Error: shared error taxonomy and `Result` alias
//! - Storage: JSON file store (global and per-project)
//! - Config: `BoxConfig` merged settings, passed explicitly to every layer

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    BoxConfig, DockerConfig, BOX_CONFIG_FILE, DEFAULT_HOOK_ROOT, DEFAULT_PROVIDER,
    DEFAULT_VAGRANT_BIN,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{JsonStore, STORE_DIR_NAME};
