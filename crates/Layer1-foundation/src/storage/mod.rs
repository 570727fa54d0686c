//! Storage module
//!
//! - `json`: JSON file store for settings

mod json;

pub use json::{JsonStore, STORE_DIR_NAME};
