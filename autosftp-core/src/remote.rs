use crate::credential::Credential;
use crate::error::{ConnectError, RemoteError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Permission bits applied to every uploaded file (rw-r--r--).
pub const UPLOAD_MODE: u32 = 0o644;

/// File-transfer primitives of an open remote channel.
///
/// Paths are absolute, forward-slash separated remote paths.
#[async_trait]
pub trait RemoteFs: Send + Sync + 'static {
    /// Initial working directory of the channel.
    async fn working_dir(&self) -> std::result::Result<String, RemoteError>;

    /// Change-directory style probe. `Ok(false)` means "no such file".
    async fn probe(&self, path: &str) -> std::result::Result<bool, RemoteError>;

    /// Creates a single directory; the parent must already exist.
    async fn mkdir(&self, path: &str) -> std::result::Result<(), RemoteError>;

    /// Uploads `local` to `remote`, overwriting unconditionally.
    ///
    /// Fails with [`crate::SyncError::LocalFileMissing`] if `local` vanished.
    async fn put(&self, local: &Path, remote: &str, mode: u32) -> Result<()>;

    async fn remove(&self, path: &str) -> std::result::Result<(), RemoteError>;

    /// Releases the channel and the transport beneath it.
    async fn close(&self) -> std::result::Result<(), RemoteError>;
}

/// Opens fresh transports. Each call is an independent attempt with its own
/// handle; a failed attempt's handle is dropped, never reused.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Connects and authenticates `user` with `credential`.
    async fn authenticate(
        &self,
        user: &str,
        credential: &Credential,
    ) -> std::result::Result<Self::Transport, ConnectError>;

    fn host(&self) -> &str;

    fn port(&self) -> u16;
}

/// An authenticated transport that has not opened its transfer channel yet.
#[async_trait]
pub trait Transport: Send {
    type Fs: RemoteFs;

    /// Opens the file-transfer subchannel without a pseudo-terminal.
    async fn open_channel(self) -> std::result::Result<Self::Fs, ConnectError>;
}
