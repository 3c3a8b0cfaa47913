//! SSH/SFTP backend for autosftp, built on russh and russh-sftp.

mod ssh_client;
mod utils;

use crate::utils::{is_failure, is_no_such_file, stream_error, to_remote_error};
use async_trait::async_trait;
use autosftp_core::{
    ConnectError, Connector, Credential, RemoteError, RemoteFs, Result, SyncError, Transport,
};
use russh::client::{AuthResult, Config, Handle};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg};
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;
use ssh_client::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

const COPY_CHUNK: usize = 32 * 1024;

/// Opens SSH transports to one host. Every `authenticate` call dials a new
/// TCP connection.
pub struct SftpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    config: Arc<Config>,
}

impl SftpConnector {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            config: Arc::new(Config::default()),
        }
    }

    async fn dial(&self) -> std::result::Result<Handle<Client>, ConnectError> {
        let stream = match timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ConnectError::Unreachable(e.to_string())),
            Err(_) => return Err(ConnectError::Unreachable("Connection timed out".into())),
        };
        match timeout(
            self.connect_timeout,
            russh::client::connect_stream(self.config.clone(), stream, Client),
        )
        .await
        {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => Err(ConnectError::Transport(format!("ssh handshake failed: {e}"))),
            Err(_) => Err(ConnectError::Unreachable("ssh handshake timed out".into())),
        }
    }
}

#[async_trait]
impl Connector for SftpConnector {
    type Transport = SshTransport;

    async fn authenticate(
        &self,
        user: &str,
        credential: &Credential,
    ) -> std::result::Result<SshTransport, ConnectError> {
        let mut handle = self.dial().await?;
        let transport_err = |e: russh::Error| ConnectError::Transport(e.to_string());

        let res = match credential {
            Credential::None => handle.authenticate_none(user).await.map_err(transport_err)?,
            Credential::Password(password) => handle
                .authenticate_password(user, password.as_str())
                .await
                .map_err(transport_err)?,
            Credential::IdentityFile(path) => {
                let key = load_secret_key(path, None).map_err(|e| {
                    ConnectError::AuthRejected(format!(
                        "cannot load identity file {}: {e}",
                        path.display()
                    ))
                })?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(transport_err)?
                    .flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await
                    .map_err(transport_err)?
            }
        };
        if let AuthResult::Failure {
            remaining_methods,
            partial_success,
        } = res
        {
            // The rejected handle is dropped with this attempt.
            return Err(ConnectError::AuthRejected(format!(
                "Auth fail, remaining_methods: {remaining_methods:?}, partial_success: {partial_success}"
            )));
        }
        debug!("authenticated as {user}@{}", self.host);
        Ok(SshTransport { handle })
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }
}

/// An authenticated SSH connection without a transfer channel yet.
pub struct SshTransport {
    handle: Handle<Client>,
}

#[async_trait]
impl Transport for SshTransport {
    type Fs = SftpRemote;

    async fn open_channel(self) -> std::result::Result<SftpRemote, ConnectError> {
        let transport_err = |e: russh::Error| ConnectError::Transport(e.to_string());
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(transport_err)?;
        // No pty-req is sent: the subsystem runs without a terminal.
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(transport_err)?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ConnectError::Transport(format!("sftp subsystem: {e}")))?;
        Ok(SftpRemote {
            sftp,
            handle: Mutex::new(Some(self.handle)),
        })
    }
}

/// An open SFTP channel plus the SSH connection carrying it.
pub struct SftpRemote {
    sftp: SftpSession,
    handle: Mutex<Option<Handle<Client>>>,
}

#[async_trait]
impl RemoteFs for SftpRemote {
    async fn working_dir(&self) -> std::result::Result<String, RemoteError> {
        self.sftp
            .canonicalize(".")
            .await
            .map_err(|e| to_remote_error("pwd", e))
    }

    async fn probe(&self, path: &str) -> std::result::Result<bool, RemoteError> {
        match self.sftp.metadata(path).await {
            Ok(attrs) if attrs.is_dir() => Ok(true),
            Ok(_) => Err(RemoteError::other(format!("cd {path}: not a directory"))),
            Err(e) if is_no_such_file(&e) => Ok(false),
            Err(e) => Err(to_remote_error(&format!("cd {path}"), e)),
        }
    }

    async fn mkdir(&self, path: &str) -> std::result::Result<(), RemoteError> {
        match self.sftp.create_dir(path).await {
            Ok(()) => Ok(()),
            // Servers answer a generic failure when the directory exists.
            Err(e) if is_failure(&e) => match self.sftp.metadata(path).await {
                Ok(attrs) if attrs.is_dir() => Err(RemoteError::already_exists(path)),
                _ => Err(to_remote_error(&format!("mkdir {path}"), e)),
            },
            Err(e) => Err(to_remote_error(&format!("mkdir {path}"), e)),
        }
    }

    async fn put(&self, local: &Path, remote: &str, mode: u32) -> Result<()> {
        let mut reader = match tokio::fs::File::open(local).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::LocalFileMissing(local.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let put_err = |e: russh_sftp::client::error::Error| {
            SyncError::RemoteIo(to_remote_error(&format!("put {remote}"), e))
        };
        let mut remote_file = self.sftp.create(remote).await.map_err(put_err)?;
        // Read errors stay local; write errors come from the channel.
        let mut buf = vec![0u8; COPY_CHUNK];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            remote_file
                .write_all(&buf[..n])
                .await
                .map_err(|e| stream_error(remote, e))?;
        }
        remote_file
            .shutdown()
            .await
            .map_err(|e| stream_error(remote, e))?;

        let mut attrs = FileAttributes::empty();
        attrs.permissions = Some(mode);
        self.sftp.set_metadata(remote, attrs).await.map_err(put_err)?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> std::result::Result<(), RemoteError> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| to_remote_error(&format!("rm {path}"), e))
    }

    async fn close(&self) -> std::result::Result<(), RemoteError> {
        let sftp_res = self.sftp.close().await;
        if let Some(handle) = self.handle.lock().await.take() {
            handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
                .map_err(|e| RemoteError::other(format!("disconnect: {e}")))?;
        }
        sftp_res.map_err(|e| to_remote_error("exit", e))
    }
}
