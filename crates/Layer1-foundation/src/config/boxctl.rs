//! BoxConfig - merged settings for the CLI and the execution core
//!
//! Values are read from the global store first, then the project store
//! overrides them. Every consumer receives a `BoxConfig` explicitly; nothing
//! is read from process-wide state after loading.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings file name inside a store
pub const BOX_CONFIG_FILE: &str = "config.json";

/// Default vagrant provider
pub const DEFAULT_PROVIDER: &str = "virtualbox";

/// Directory inside a container where hook executables live
pub const DEFAULT_HOOK_ROOT: &str = "/opt/nanobox/hooks";

/// Default vagrant executable
pub const DEFAULT_VAGRANT_BIN: &str = "vagrant";

// ============================================================================
// Box Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Application name; defaults to the current directory name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Directory holding the Vagrantfile and `.vagrant/` state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_root: Option<PathBuf>,

    /// Vagrant provider (virtualbox, vmware_fusion, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Hook directory prefix used for in-container commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_root: Option<String>,

    /// Vagrant executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vagrant_bin: Option<String>,

    #[serde(default)]
    pub docker: DockerConfig,
}

impl BoxConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Self::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global + project merged load
    pub fn load() -> Result<Self> {
        let global = JsonStore::global().ok();
        let project = JsonStore::current_project().ok();
        Self::load_from(global.as_ref(), project.as_ref())
    }

    /// Merged load from explicit stores (project wins)
    pub fn load_from(global: Option<&JsonStore>, project: Option<&JsonStore>) -> Result<Self> {
        let mut config = Self::new();

        for store in [global, project].into_iter().flatten() {
            if let Some(loaded) = store.load_optional::<BoxConfig>(BOX_CONFIG_FILE)? {
                debug!("Loaded config from {}", store.file_path(BOX_CONFIG_FILE).display());
                config.merge(loaded);
            }
        }

        Ok(config)
    }

    /// Write this config into `store`, returning the file written
    pub fn save_to(&self, store: &JsonStore) -> Result<PathBuf> {
        store.save(BOX_CONFIG_FILE, self)
    }

    pub fn save_project(&self) -> Result<PathBuf> {
        self.save_to(&JsonStore::current_project()?)
    }

    pub fn save_global(&self) -> Result<PathBuf> {
        self.save_to(&JsonStore::global()?)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge another config into this one (`other` wins)
    pub fn merge(&mut self, other: BoxConfig) {
        if other.app_name.is_some() {
            self.app_name = other.app_name;
        }
        if other.app_root.is_some() {
            self.app_root = other.app_root;
        }
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.hook_root.is_some() {
            self.hook_root = other.hook_root;
        }
        if other.vagrant_bin.is_some() {
            self.vagrant_bin = other.vagrant_bin;
        }
        self.docker.merge(other.docker);
    }

    // ========================================================================
    // Resolved values
    // ========================================================================

    /// Application name, falling back to the current directory name
    pub fn app_name(&self) -> Result<String> {
        if let Some(name) = &self.app_name {
            return Ok(name.clone());
        }
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))?;
        cwd.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config("Cannot derive app name from current directory".into()))
    }

    /// Application directory (`~/.boxctl/apps/<app>` unless overridden)
    pub fn app_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.app_root {
            return Ok(root.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot find home directory".to_string()))?;
        Ok(apps_dir(&home).join(self.app_name()?))
    }

    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn hook_root(&self) -> &str {
        self.hook_root.as_deref().unwrap_or(DEFAULT_HOOK_ROOT)
    }

    pub fn vagrant_bin(&self) -> &str {
        self.vagrant_bin.as_deref().unwrap_or(DEFAULT_VAGRANT_BIN)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_app_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.app_root = Some(root.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_hook_root(mut self, root: impl Into<String>) -> Self {
        self.hook_root = Some(root.into());
        self
    }

    pub fn with_vagrant_bin(mut self, bin: impl Into<String>) -> Self {
        self.vagrant_bin = Some(bin.into());
        self
    }
}

fn apps_dir(home: &Path) -> PathBuf {
    home.join(".boxctl").join("apps")
}

// ============================================================================
// Docker Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    /// Client request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl DockerConfig {
    fn merge(&mut self, other: DockerConfig) {
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoxConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.provider(), "virtualbox");
        assert_eq!(config.hook_root(), "/opt/nanobox/hooks");
        assert_eq!(config.vagrant_bin(), "vagrant");
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = BoxConfig::new()
            .with_app_name("base")
            .with_provider("vmware_fusion");
        let other = BoxConfig::new().with_app_name("override");

        base.merge(other);
        assert_eq!(base.app_name.as_deref(), Some("override"));
        assert_eq!(base.provider(), "vmware_fusion");
    }

    #[test]
    fn test_app_root_explicit() {
        let config = BoxConfig::new().with_app_root("/srv/apps/web");
        assert_eq!(config.app_root().unwrap(), PathBuf::from("/srv/apps/web"));
    }

    #[test]
    fn test_load_from_project_overrides_global() {
        let global_dir = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();
        let global = JsonStore::new(global_dir.path());
        let project = JsonStore::new(project_dir.path());

        std::fs::write(
            global.file_path(BOX_CONFIG_FILE),
            r#"{"appName": "global-app", "provider": "parallels", "docker": {"timeoutSecs": 30}}"#,
        )
        .unwrap();
        std::fs::write(
            project.file_path(BOX_CONFIG_FILE),
            r#"{"appName": "project-app"}"#,
        )
        .unwrap();

        let config = BoxConfig::load_from(Some(&global), Some(&project)).unwrap();
        assert_eq!(config.app_name().unwrap(), "project-app");
        assert_eq!(config.provider(), "parallels");
        assert_eq!(config.docker.timeout_secs, Some(30));
    }

    #[test]
    fn test_save_to_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let project = JsonStore::project(dir.path());
        let config = BoxConfig::new()
            .with_app_name("blog")
            .with_vagrant_bin("/usr/local/bin/vagrant");

        let path = config.save_to(&project).unwrap();
        assert_eq!(path, dir.path().join(".boxctl").join(BOX_CONFIG_FILE));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"appName\": \"blog\""));
        assert!(!written.contains("provider"));

        let loaded = BoxConfig::load_from(None, Some(&project)).unwrap();
        assert_eq!(loaded.app_name().unwrap(), "blog");
        assert_eq!(loaded.vagrant_bin(), "/usr/local/bin/vagrant");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(
            store.file_path(BOX_CONFIG_FILE),
            r#"{"appName": "legacy", "serverUri": "192.168.99.50:1757"}"#,
        )
        .unwrap();

        let config = BoxConfig::load_from(Some(&store), None).unwrap();
        assert_eq!(config.app_name().unwrap(), "legacy");
    }

    #[test]
    fn test_load_from_nothing() {
        let config = BoxConfig::load_from(None, None).unwrap();
        assert!(config.app_name.is_none());
        assert_eq!(config.provider(), DEFAULT_PROVIDER);
    }
}
