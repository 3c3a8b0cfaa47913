//! Core library for autosftp – mirrors a local directory onto a remote one.

mod address;
mod config;
mod credential;
mod error;
mod file_op;
mod filter;
mod reconcile;
mod remote;
mod session;
mod task;
mod utils;
mod watcher;

#[cfg(test)]
mod testing;

pub use address::{parse_port, SshAddress};
pub use config::{Pattern, SyncConfig, SyncTarget, WatchMode};
pub use credential::{Credential, CredentialSource, NoCredentials, Secret, StaticPassword};
pub use error::{ConnectError, RemoteError, RemoteErrorKind, Result, SyncError};
pub use file_op::{event_to_events, WatchEvent, WatchKind};
pub use filter::PathFilter;
pub use reconcile::reconcile;
pub use remote::{Connector, RemoteFs, Transport, UPLOAD_MODE};
pub use session::{RemoteSession, SessionState, MAX_ATTEMPTS};
pub use task::{DispatchStats, Outcome, SyncDispatcher};
pub use utils::{absolute_local, as_posix_path, normalize_remote, translate};
pub use watcher::{diff, scan, watch, EventSource, NotifyWatcher, PollWatcher, Signature, Snapshot};
