//! The single remote session: connect with bounded retries, then serve the
//! dispatcher's probe/mkdir/put/remove calls until closed.

use crate::config::SyncTarget;
use crate::credential::{Credential, CredentialSource};
use crate::error::{ConnectError, RemoteErrorKind, Result, SyncError};
use crate::remote::{Connector, RemoteFs, Transport};
use crate::utils::normalize_remote;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Connection attempts allowed per `connect` call.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Ready,
}

type FsOf<C> = <<C as Connector>::Transport as Transport>::Fs;

pub struct RemoteSession<C: Connector> {
    connector: C,
    user: String,
    identity: Option<PathBuf>,
    state: SessionState,
    fs: Option<FsOf<C>>,
    remote_root: Option<String>,
    attempts: u32,
}

impl<C: Connector> RemoteSession<C> {
    /// `remote_root` is the explicitly configured root, if any. A relative
    /// root is resolved against the channel's working directory.
    pub fn new(
        connector: C,
        user: impl Into<String>,
        identity: Option<PathBuf>,
        remote_root: Option<String>,
    ) -> Self {
        Self {
            connector,
            user: user.into(),
            identity,
            state: SessionState::Disconnected,
            fs: None,
            remote_root,
            attempts: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Attempts used by the last `connect`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Resolved remote root; `None` until the session is ready.
    pub fn remote_root(&self) -> Option<&str> {
        match self.state {
            SessionState::Ready => self.remote_root.as_deref(),
            _ => None,
        }
    }

    /// Pairs the resolved remote root with `local_root`.
    pub fn target(&self, local_root: &Path) -> Result<SyncTarget> {
        let remote = self.remote_root().ok_or(SyncError::NotConnected)?;
        SyncTarget::new(local_root, remote)
    }

    pub async fn connect(&mut self, credentials: &mut dyn CredentialSource) -> Result<()> {
        if self.state == SessionState::Ready {
            return Ok(());
        }
        self.state = SessionState::Connecting;
        let res = self.establish(credentials).await;
        if res.is_err() {
            self.state = SessionState::Disconnected;
        }
        res
    }

    async fn establish(&mut self, credentials: &mut dyn CredentialSource) -> Result<()> {
        let host = self.connector.host().to_string();
        let port = self.connector.port();
        let mut credential = match (&self.identity, credentials.preset()) {
            (Some(path), _) => Credential::IdentityFile(path.clone()),
            (None, Some(secret)) => Credential::Password(secret),
            (None, None) => Credential::None,
        };

        self.attempts = 0;
        let transport = loop {
            self.attempts += 1;
            debug!(attempt = self.attempts, "connecting to {host}:{port}");
            // Every attempt gets a brand new transport; failed ones are dropped here.
            match self.connector.authenticate(&self.user, &credential).await {
                Ok(transport) => break transport,
                Err(ConnectError::Unreachable(reason)) | Err(ConnectError::Transport(reason)) => {
                    return Err(SyncError::Connectivity { host, port, reason });
                }
                Err(ConnectError::AuthRejected(reason)) => {
                    warn!(attempt = self.attempts, "authentication failed: {reason}");
                    let auth_err = |reason: String| SyncError::Authentication {
                        user: self.user.clone(),
                        host: host.clone(),
                        reason,
                    };
                    if self.identity.is_some() {
                        return Err(auth_err(format!("identity file rejected: {reason}")));
                    }
                    if self.attempts >= MAX_ATTEMPTS {
                        return Err(auth_err(format!(
                            "giving up after {MAX_ATTEMPTS} attempts: {reason}"
                        )));
                    }
                    match credentials.prompt(&self.user, &host) {
                        Some(secret) => credential = Credential::Password(secret),
                        None => {
                            return Err(auth_err(
                                "no interactive credential source, consider passing an identity file"
                                    .into(),
                            ))
                        }
                    }
                }
            }
        };
        self.state = SessionState::Authenticated;

        let fs = transport
            .open_channel()
            .await
            .map_err(|e| SyncError::Connectivity {
                host: host.clone(),
                port,
                reason: e.to_string(),
            })?;

        let root = match self.resolve_root(&fs).await {
            Ok(root) => root,
            Err(e) => {
                if let Err(close_err) = fs.close().await {
                    warn!("closing half-open channel: {close_err}");
                }
                return Err(e);
            }
        };
        info!("Remote Default Path: {root}");
        self.remote_root = Some(root);
        self.fs = Some(fs);
        self.state = SessionState::Ready;
        Ok(())
    }

    async fn resolve_root(&self, fs: &FsOf<C>) -> Result<String> {
        match self.remote_root.as_deref() {
            Some(root) if root.starts_with('/') => Ok(normalize_remote(root)),
            Some(root) => {
                let cwd = fs.working_dir().await?;
                Ok(normalize_remote(&format!("{cwd}/{root}")))
            }
            None => Ok(normalize_remote(&fs.working_dir().await?)),
        }
    }

    fn channel(&self) -> Result<&FsOf<C>> {
        match (self.state, &self.fs) {
            (SessionState::Ready, Some(fs)) => Ok(fs),
            _ => Err(SyncError::NotConnected),
        }
    }

    pub async fn probe(&self, path: &str) -> Result<bool> {
        Ok(self.channel()?.probe(path).await?)
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        Ok(self.channel()?.mkdir(path).await?)
    }

    pub async fn put(&self, local: &Path, remote: &str, mode: u32) -> Result<()> {
        self.channel()?.put(local, remote, mode).await
    }

    /// Removing a path that does not exist remotely counts as success.
    pub async fn remove(&self, path: &str) -> Result<()> {
        match self.channel()?.remove(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind == RemoteErrorKind::NotFound => {
                debug!("{path} already absent on remote");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Releases the channel and transport. Safe to call in any state, any
    /// number of times.
    pub async fn close(&mut self) {
        if let Some(fs) = self.fs.take() {
            if let Err(e) = fs.close().await {
                warn!("error while closing session: {e}");
            }
            info!("SSH CLOSED");
        }
        self.state = SessionState::Disconnected;
    }
}
