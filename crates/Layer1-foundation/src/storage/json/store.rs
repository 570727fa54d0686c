//! Settings directories holding JSON documents
//!
//! A missing document is not an error: callers get `None` and fall back to
//! defaults. Anything else that goes wrong reading or writing is reported
//! with the offending path.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Directory name used for both the global and the per-project store
pub const STORE_DIR_NAME: &str = "boxctl";

/// A settings directory, global or per-project
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config_dir>/boxctl/`
    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join(STORE_DIR_NAME)))
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))
    }

    /// `<root>/.boxctl/`
    pub fn project(root: impl Into<PathBuf>) -> Self {
        Self::new(root.into().join(format!(".{}", STORE_DIR_NAME)))
    }

    /// Project store rooted at the current directory
    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))?;
        Ok(Self::project(cwd))
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Parse `name`, or `None` when the store has no such document
    pub fn load_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.file_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write `data` as pretty JSON, creating the directory first
    ///
    /// Returns the path written.
    pub fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<PathBuf> {
        let content = serde_json::to_string_pretty(data)?;
        std::fs::create_dir_all(&self.dir)?;

        let path = self.file_path(name);
        std::fs::write(&path, content + "\n")
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::path::Path;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Machine {
        name: String,
        cpus: u32,
    }

    #[test]
    fn test_save_creates_dir_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());
        let machine = Machine {
            name: "web".to_string(),
            cpus: 2,
        };

        let path = store.save("machine.json", &machine).unwrap();

        assert_eq!(path, dir.path().join(".boxctl").join("machine.json"));
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("}\n"));
        let loaded: Option<Machine> = store.load_optional("machine.json").unwrap();
        assert_eq!(loaded, Some(machine));
    }

    #[test]
    fn test_missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("never-created"));

        let loaded: Option<Machine> = store.load_optional("machine.json").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("machine.json"), "{not json").unwrap();
        let store = JsonStore::new(dir.path());

        let err = store.load_optional::<Machine>("machine.json").unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("machine.json")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_document_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("machine.json")).unwrap();
        let store = JsonStore::new(dir.path());

        let err = store.load_optional::<Machine>("machine.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_save_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = JsonStore::new(&blocker);

        let err = store.save("machine.json", &1u32).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_project_dir_name() {
        let store = JsonStore::project("/tmp/app");
        assert_eq!(
            store.file_path("config.json"),
            Path::new("/tmp/app/.boxctl/config.json")
        );
    }
}
