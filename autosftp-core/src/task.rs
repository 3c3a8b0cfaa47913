use crate::{
    config::SyncTarget,
    file_op::{WatchEvent, WatchKind},
    filter::PathFilter,
    reconcile::reconcile,
    remote::{Connector, UPLOAD_MODE},
    session::RemoteSession,
    utils::as_posix_path,
    watcher::EventSource,
    Result,
};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Tally of a dispatcher run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub uploaded: u64,
    pub removed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Uploaded,
    Removed,
    Skipped,
}

/// Turns watch events into remote operations, one at a time, in the order
/// they arrive.
pub struct SyncDispatcher<'a, C: Connector> {
    session: &'a RemoteSession<C>,
    target: SyncTarget,
    filter: PathFilter,
}

impl<'a, C: Connector> SyncDispatcher<'a, C> {
    pub fn new(session: &'a RemoteSession<C>, target: SyncTarget, filter: PathFilter) -> Self {
        Self {
            session,
            target,
            filter,
        }
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Applies a single event. Errors are returned, not logged.
    pub async fn dispatch(&self, event: &WatchEvent) -> Result<Outcome> {
        let remote = self.target.translate(&event.path)?;
        let rel = self.target.relative(&event.path)?;
        let rel = rel.as_path();
        if !self.filter.check(rel) {
            debug!("filtered out {}", as_posix_path(rel));
            return Ok(Outcome::Skipped);
        }

        match event.kind {
            WatchKind::Created | WatchKind::Modified => {
                info!(kind = ?event.kind, "File changed: {}", as_posix_path(rel));
                reconcile(self.session, self.target.remote_root(), &remote).await?;
                self.session.put(&event.path, &remote, UPLOAD_MODE).await?;
                info!("File Uploaded: {remote}");
                Ok(Outcome::Uploaded)
            }
            WatchKind::Deleted => {
                if event.path.exists() {
                    debug!("{} exists again, not deleting", event.path.display());
                    return Ok(Outcome::Skipped);
                }
                info!("File Deleted: {}", as_posix_path(rel));
                self.session.remove(&remote).await?;
                info!("Remote Deleted: {remote}");
                Ok(Outcome::Removed)
            }
        }
    }

    /// Drives `events` until it ends or `shutdown` resolves. A failing event is
    /// logged and dropped; the loop keeps going. An event in flight always
    /// completes before shutdown is noticed.
    pub async fn run<E, S>(&self, mut events: E, shutdown: S) -> DispatchStats
    where
        E: EventSource,
        S: Future<Output = ()>,
    {
        let mut stats = DispatchStats::default();
        tokio::pin!(shutdown);
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                ev = events.next_event() => match ev {
                    Some(ev) => ev,
                    None => {
                        warn!("event source closed");
                        break;
                    }
                },
            };
            match self.dispatch(&event).await {
                Ok(Outcome::Uploaded) => stats.uploaded += 1,
                Ok(Outcome::Removed) => stats.removed += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!(kind = ?event.kind, path = %event.path.display(), "sync failed: {e}");
                }
            }
        }
        stats
    }
}
