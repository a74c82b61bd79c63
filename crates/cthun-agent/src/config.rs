//! Agent configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON configuration file
pub const CONFIG_ENV: &str = "CTHUN_AGENT_CONFIG";
/// Environment variable overriding `spool_dir`
pub const SPOOL_DIR_ENV: &str = "CTHUN_AGENT_SPOOL_DIR";
/// Environment variable overriding `modules_dir`
pub const MODULES_DIR_ENV: &str = "CTHUN_AGENT_MODULES_DIR";

const DEFAULT_SPOOL_DIR: &str = "/tmp/cthun-agent/spool";

/// Settings injected into the processor and registry at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Root of the job result spool
    pub spool_dir: PathBuf,
    /// Directory of external module executables
    pub modules_dir: Option<PathBuf>,
    /// `tracing` filter directive; `RUST_LOG` applies when unset
    pub log_filter: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from(DEFAULT_SPOOL_DIR),
            modules_dir: None,
            log_filter: None,
        }
    }
}

impl AgentConfig {
    /// Load from the file named by `CTHUN_AGENT_CONFIG` (if any), then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var_os(key));
        Ok(config)
    }

    /// Parse a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid configuration file {:?}", path))
    }

    /// Override settings from variables resolved by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        if let Some(dir) = lookup(SPOOL_DIR_ENV).filter(|v| !v.is_empty()) {
            self.spool_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(MODULES_DIR_ENV).filter(|v| !v.is_empty()) {
            self.modules_dir = Some(PathBuf::from(dir));
        }
    }

    /// Set the spool directory
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = dir.into();
        self
    }

    /// Set the external modules directory
    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }
}
