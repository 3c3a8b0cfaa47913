//! Change detection for the watch root.
//!
//! Both backends hand out events through [`EventSource`]; the dispatcher does
//! not know which one it is consuming.

use crate::config::WatchMode;
use crate::error::{Result, SyncError};
use crate::file_op::{event_to_events, WatchEvent};
use crate::utils::absolute_local;
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A lazy, endless stream of changes. Sources are consumed once and cannot
/// be restarted.
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next change. `None` once the source has shut down.
    async fn next_event(&mut self) -> Option<WatchEvent>;
}

#[async_trait]
impl<E: EventSource + ?Sized> EventSource for Box<E> {
    async fn next_event(&mut self) -> Option<WatchEvent> {
        (**self).next_event().await
    }
}

/// Opens the configured backend on `root`. Events always carry absolute
/// paths, even for a relative `root`.
pub async fn watch(
    root: &Path,
    mode: WatchMode,
    interval: Duration,
) -> Result<Box<dyn EventSource>> {
    Ok(match mode {
        WatchMode::Poll => Box::new(PollWatcher::new(root, interval).await?),
        WatchMode::Native => Box::new(NotifyWatcher::new(root)?),
    })
}

fn ensure_root(root: &Path) -> Result<PathBuf> {
    if root.is_dir() {
        absolute_local(root)
    } else {
        Err(SyncError::WatchRootMissing(root.to_path_buf()))
    }
}

async fn scan_blocking(root: PathBuf) -> Result<Snapshot> {
    tokio::task::spawn_blocking(move || scan(&root))
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))
}

/// What a poll remembers about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

pub type Snapshot = BTreeMap<PathBuf, Signature>;

/// Regular files under `root`, keyed by path. Unreadable entries are skipped.
pub fn scan(root: &Path) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => {
                snapshot.insert(
                    entry.into_path(),
                    Signature {
                        modified: meta.modified().ok(),
                        len: meta.len(),
                    },
                );
            }
            Err(e) => debug!("skipping {}: {e}", entry.path().display()),
        }
    }
    snapshot
}

/// Events turning `old` into `new`, in path order.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    for (path, sig) in new {
        match old.get(path) {
            None => events.push(WatchEvent::created(path)),
            Some(prev) if prev != sig => events.push(WatchEvent::modified(path)),
            Some(_) => {}
        }
    }
    for path in old.keys() {
        if !new.contains_key(path) {
            events.push(WatchEvent::deleted(path));
        }
    }
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

/// Snapshot-comparing watcher. The first snapshot is taken on construction,
/// so files already present produce no events.
pub struct PollWatcher {
    root: PathBuf,
    interval: Duration,
    snapshot: Snapshot,
    pending: VecDeque<WatchEvent>,
}

impl PollWatcher {
    pub async fn new(root: &Path, interval: Duration) -> Result<Self> {
        let root = ensure_root(root)?;
        let snapshot = scan_blocking(root.clone()).await?;
        Ok(Self {
            root,
            interval,
            snapshot,
            pending: VecDeque::new(),
        })
    }

    /// Runs one comparison and queues whatever changed.
    pub async fn poll(&mut self) {
        if !self.root.is_dir() {
            warn!("watch root {} is gone, skipping poll", self.root.display());
            return;
        }
        let current = match scan_blocking(self.root.clone()).await {
            Ok(s) => s,
            Err(e) => {
                warn!("directory scan failed: {e}");
                return;
            }
        };
        self.pending.extend(diff(&self.snapshot, &current));
        self.snapshot = current;
    }
}

#[async_trait]
impl EventSource for PollWatcher {
    async fn next_event(&mut self) -> Option<WatchEvent> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Some(ev);
            }
            tokio::time::sleep(self.interval).await;
            self.poll().await;
        }
    }
}

/// Watcher backed by OS change notifications.
pub struct NotifyWatcher {
    // Dropping the watcher stops the notifications.
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<WatchEvent>,
}

impl NotifyWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let root = ensure_root(root)?;
        let (tx, rx) = mpsc::channel::<WatchEvent>(1024);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for ev in event_to_events(event) {
                        let _ = tx.blocking_send(ev);
                    }
                }
                Err(e) => tracing::error!("watch error: {e}"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }
}

#[async_trait]
impl EventSource for NotifyWatcher {
    async fn next_event(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_op::WatchKind;

    fn sig(len: u64) -> Signature {
        Signature { modified: None, len }
    }

    #[test]
    fn diff_classifies_changes() {
        let mut old = Snapshot::new();
        old.insert("/w/kept".into(), sig(1));
        old.insert("/w/changed".into(), sig(1));
        old.insert("/w/removed".into(), sig(1));
        let mut new = Snapshot::new();
        new.insert("/w/kept".into(), sig(1));
        new.insert("/w/changed".into(), sig(2));
        new.insert("/w/added".into(), sig(1));

        assert_eq!(
            diff(&old, &new),
            vec![
                WatchEvent::created("/w/added"),
                WatchEvent::modified("/w/changed"),
                WatchEvent::deleted("/w/removed"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = PollWatcher::new(&missing, Duration::from_millis(10)).await.err().unwrap();
        assert!(matches!(err, SyncError::WatchRootMissing(p) if p == missing));

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            watch(&file, WatchMode::Poll, Duration::from_millis(10)).await,
            Err(SyncError::WatchRootMissing(_))
        ));
    }

    #[test]
    fn scan_lists_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.txt"), b"abc").unwrap();
        std::fs::write(dir.path().join("top"), b"").unwrap();

        let snap = scan(dir.path());
        let names: Vec<_> = snap.keys().map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf()).collect();
        assert_eq!(names, vec![PathBuf::from("a/b/c.txt"), PathBuf::from("top")]);
        assert_eq!(snap[&dir.path().join("a/b/c.txt")].len, 3);
    }

    #[tokio::test]
    async fn poll_reports_create_modify_delete() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("existing.txt");
        std::fs::write(&existing, b"old").unwrap();

        let mut watcher = PollWatcher::new(dir.path(), Duration::from_millis(10)).await.unwrap();

        let fresh = dir.path().join("sub/fresh.txt");
        std::fs::create_dir_all(fresh.parent().unwrap()).unwrap();
        std::fs::write(&fresh, b"hello").unwrap();
        let ev = watcher.next_event().await.unwrap();
        assert_eq!(ev, WatchEvent::created(&fresh));

        std::fs::write(&existing, b"longer content").unwrap();
        let ev = watcher.next_event().await.unwrap();
        assert_eq!(ev.kind, WatchKind::Modified);
        assert_eq!(ev.path, existing);

        std::fs::remove_file(&fresh).unwrap();
        let ev = watcher.next_event().await.unwrap();
        assert_eq!(ev, WatchEvent::deleted(&fresh));
    }

    #[tokio::test]
    async fn vanished_root_does_not_report_mass_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("f"), b"x").unwrap();

        let mut watcher = PollWatcher::new(&root, Duration::from_millis(10)).await.unwrap();
        std::fs::remove_dir_all(&root).unwrap();
        watcher.poll().await;
        assert!(watcher.pending.is_empty());
    }
}
