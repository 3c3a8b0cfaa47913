use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::utils::{absolute_local, normalize_remote};

/// Glob pattern (wrapper type for clarity)
/// Compiled into a `globset::GlobSet` by [`crate::PathFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern(pub String);

/// Change-detection backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Compare directory snapshots every `scan_ms`.
    #[default]
    Poll,
    /// OS change notifications.
    Native,
}

/// Everything the bootstrap needs, as read from a config file or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub local: PathBuf,
    pub host: String,
    #[serde(default = "SyncConfig::default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    /// Remote root. Defaults to the channel's working directory.
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub identity: Option<PathBuf>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub include: Vec<Pattern>,
    #[serde(default)]
    pub exclude: Vec<Pattern>,
    #[serde(default = "SyncConfig::default_scan_ms")]
    pub scan_ms: u64,
    #[serde(default)]
    pub watch: WatchMode,
    #[serde(default = "SyncConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl SyncConfig {
    pub const DEFAULT_PORT: u16 = 22;

    fn default_port() -> u16 { Self::DEFAULT_PORT }
    fn default_scan_ms() -> u64 { 5000 }
    fn default_connect_timeout_ms() -> u64 { 30_000 }

    pub fn new(local: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            host: host.into(),
            port: Self::default_port(),
            user: None,
            remote: None,
            identity: None,
            password: None,
            include: Vec::new(),
            exclude: Vec::new(),
            scan_ms: Self::default_scan_ms(),
            watch: WatchMode::default(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::Config("remote host is empty".into()));
        }
        if self.port == 0 {
            return Err(SyncError::Config("invalid port '0'".into()));
        }
        if self.scan_ms == 0 {
            return Err(SyncError::Config("scan interval must be positive".into()));
        }
        Ok(())
    }
}

/// The fixed local-root / remote-root pair, established once the session is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    local_root: PathBuf,
    remote_root: String,
}

impl SyncTarget {
    /// `local_root` is made absolute against the current directory and normalized.
    pub fn new(local_root: &Path, remote_root: impl Into<String>) -> Result<Self> {
        Ok(Self {
            local_root: absolute_local(local_root)?,
            remote_root: normalize_remote(&remote_root.into()),
        })
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Relative paths are resolved against the current directory, the same
    /// way the local root was.
    pub fn translate(&self, local_path: &Path) -> Result<String> {
        let path = absolute_local(local_path)?;
        crate::utils::translate(&self.local_root, &self.remote_root, &path)
    }

    /// `local_path` relative to the local root.
    pub fn relative(&self, local_path: &Path) -> Result<PathBuf> {
        let path = absolute_local(local_path)?;
        match path.strip_prefix(&self.local_root) {
            Ok(rel) => Ok(rel.to_path_buf()),
            Err(_) => Err(SyncError::PathOutsideRoot {
                path,
                root: self.local_root.clone(),
            }),
        }
    }
}
