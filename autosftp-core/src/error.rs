//! Error types shared by the sync engine and its remote backends.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid address string, port, watch root or config file.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("ssh: connect to host {host} port {port}: {reason}")]
    Connectivity {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("authentication failed for {user}@{host}: {reason}")]
    Authentication {
        user: String,
        host: String,
        reason: String,
    },

    #[error("remote I/O error: {0}")]
    RemoteIo(#[from] RemoteError),

    #[error("local file {} no longer exists", .0.display())]
    LocalFileMissing(PathBuf),

    #[error("directory not found: {}", .0.display())]
    WatchRootMissing(PathBuf),

    #[error("{} is not inside the watch root {}", path.display(), root.display())]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    #[error("remote session is not ready")]
    NotConnected,

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Errors raised while configuring or opening the session abort the process;
    /// everything else is scoped to a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_)
                | SyncError::Connectivity { .. }
                | SyncError::Authentication { .. }
                | SyncError::WatchRootMissing(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Other,
}

/// Failure of a single remote primitive (probe, mkdir, put, remove).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::AlreadyExists, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Other, message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RemoteErrorKind::NotFound => "no such file",
            RemoteErrorKind::AlreadyExists => "already exists",
            RemoteErrorKind::PermissionDenied => "permission denied",
            RemoteErrorKind::Other => "failure",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Outcome of one connection attempt, classified for the retry loop.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Refused, unreachable or timed out. Never retried.
    #[error("{0}")]
    Unreachable(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}
