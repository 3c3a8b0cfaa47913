//! In-memory remote used by the unit tests.

use crate::credential::{Credential, CredentialSource, Secret};
use crate::error::{ConnectError, RemoteError, RemoteErrorKind, Result, SyncError};
use crate::remote::{Connector, RemoteFs, Transport};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Default)]
pub(crate) struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    cwd: String,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, (Vec<u8>, u32)>,
    mkdir_calls: Vec<String>,
    fail_mkdir: HashSet<String>,
    hidden_from_probe: HashSet<String>,
    fail_working_dir: bool,
    closed: u32,
}

/// A remote filesystem living in a mutex. Clones share state.
#[derive(Debug, Clone)]
pub(crate) struct MemoryRemote(Arc<Mutex<RemoteState>>);

impl MemoryRemote {
    pub fn new(cwd: &str) -> Self {
        let mut state = RemoteState {
            cwd: cwd.to_string(),
            ..Default::default()
        };
        state.dirs.insert("/".into());
        let mut acc = String::new();
        for seg in cwd.split('/').filter(|s| !s.is_empty()) {
            acc.push('/');
            acc.push_str(seg);
            state.dirs.insert(acc.clone());
        }
        Self(Arc::new(Mutex::new(state)))
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.0.lock().unwrap()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<(Vec<u8>, u32)> {
        self.lock().files.get(path).cloned()
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.lock().mkdir_calls.clone()
    }

    pub fn fail_mkdir(&self, path: &str) {
        self.lock().fail_mkdir.insert(path.to_string());
    }

    /// Makes probes miss `path` even though it exists, as if another client
    /// created it between probe and mkdir.
    pub fn hide_from_probe(&self, path: &str) {
        let mut state = self.lock();
        state.dirs.insert(path.to_string());
        state.hidden_from_probe.insert(path.to_string());
    }

    pub fn fail_working_dir(&self) {
        self.lock().fail_working_dir = true;
    }

    pub fn closed(&self) -> u32 {
        self.lock().closed
    }
}

fn parent_of(path: &str) -> String {
    crate::utils::remote_parent(path).unwrap_or_else(|| "/".into())
}

#[async_trait]
impl RemoteFs for MemoryRemote {
    async fn working_dir(&self) -> std::result::Result<String, RemoteError> {
        let state = self.lock();
        if state.fail_working_dir {
            return Err(RemoteError::new(RemoteErrorKind::PermissionDenied, "pwd"));
        }
        Ok(state.cwd.clone())
    }

    async fn probe(&self, path: &str) -> std::result::Result<bool, RemoteError> {
        let state = self.lock();
        if state.hidden_from_probe.contains(path) {
            return Ok(false);
        }
        if state.dirs.contains(path) {
            Ok(true)
        } else if state.files.contains_key(path) {
            Err(RemoteError::other(format!("{path} is not a directory")))
        } else {
            Ok(false)
        }
    }

    async fn mkdir(&self, path: &str) -> std::result::Result<(), RemoteError> {
        let mut state = self.lock();
        state.mkdir_calls.push(path.to_string());
        if state.fail_mkdir.contains(path) {
            return Err(RemoteError::new(RemoteErrorKind::PermissionDenied, path));
        }
        if state.dirs.contains(path) {
            return Err(RemoteError::already_exists(path));
        }
        if !state.dirs.contains(&parent_of(path)) {
            return Err(RemoteError::not_found(path));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn put(&self, local: &Path, remote: &str, mode: u32) -> Result<()> {
        let data = match tokio::fs::read(local).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::LocalFileMissing(local.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut state = self.lock();
        if !state.dirs.contains(&parent_of(remote)) {
            return Err(RemoteError::not_found(remote).into());
        }
        state.files.insert(remote.to_string(), (data, mode));
        Ok(())
    }

    async fn remove(&self, path: &str) -> std::result::Result<(), RemoteError> {
        match self.lock().files.remove(path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found(path)),
        }
    }

    async fn close(&self) -> std::result::Result<(), RemoteError> {
        self.lock().closed += 1;
        Ok(())
    }
}

pub(crate) struct MemoryTransport {
    remote: MemoryRemote,
    refuse_channel: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    type Fs = MemoryRemote;

    async fn open_channel(self) -> std::result::Result<MemoryRemote, ConnectError> {
        if self.refuse_channel {
            return Err(ConnectError::Transport("subsystem request failed".into()));
        }
        Ok(self.remote)
    }
}

/// Connector accepting either anything or one specific password.
pub(crate) struct MemoryConnector {
    remote: MemoryRemote,
    password: Option<String>,
    unreachable: bool,
    broken_transport: bool,
    refuse_channel: bool,
    calls: Counter,
}

impl MemoryConnector {
    pub fn open() -> Self {
        Self {
            remote: MemoryRemote::new("/home/bob"),
            password: None,
            unreachable: false,
            broken_transport: false,
            refuse_channel: false,
            calls: Counter::default(),
        }
    }

    pub fn with_password(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..Self::open()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::open()
        }
    }

    /// Fails every attempt with a protocol error that is neither refusal nor auth.
    pub fn broken_transport() -> Self {
        Self {
            broken_transport: true,
            ..Self::open()
        }
    }

    /// Authenticates, then fails to open the transfer channel.
    pub fn refusing_channel() -> Self {
        Self {
            refuse_channel: true,
            ..Self::open()
        }
    }

    pub fn calls(&self) -> Counter {
        self.calls.clone()
    }

    pub fn remote(&self) -> MemoryRemote {
        self.remote.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn authenticate(
        &self,
        _user: &str,
        credential: &Credential,
    ) -> std::result::Result<MemoryTransport, ConnectError> {
        self.calls.bump();
        if self.unreachable {
            return Err(ConnectError::Unreachable("Connection refused".into()));
        }
        if self.broken_transport {
            return Err(ConnectError::Transport("kex exchange failed".into()));
        }
        let accepted = match (&self.password, credential) {
            (None, _) => true,
            (Some(expected), Credential::Password(given)) => expected == given.as_str(),
            (Some(_), _) => false,
        };
        if accepted {
            Ok(MemoryTransport {
                remote: self.remote.clone(),
                refuse_channel: self.refuse_channel,
            })
        } else {
            Err(ConnectError::AuthRejected("Auth fail".into()))
        }
    }

    fn host(&self) -> &str {
        "memory"
    }

    fn port(&self) -> u16 {
        22
    }
}

/// Answers prompts from a fixed list.
pub(crate) struct ScriptedPrompt {
    preset: Option<String>,
    answers: VecDeque<String>,
    asked: u32,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            preset: None,
            answers: answers.iter().map(|s| s.to_string()).collect(),
            asked: 0,
        }
    }

    pub fn with_preset(mut self, preset: &str) -> Self {
        self.preset = Some(preset.to_string());
        self
    }

    pub fn asked(&self) -> u32 {
        self.asked
    }
}

impl CredentialSource for ScriptedPrompt {
    fn preset(&self) -> Option<Secret> {
        self.preset.clone().map(Zeroizing::new)
    }

    fn prompt(&mut self, _user: &str, _host: &str) -> Option<Secret> {
        self.asked += 1;
        self.answers.pop_front().map(Zeroizing::new)
    }
}
