use crate::error::{RemoteErrorKind, Result, SyncError};
use crate::remote::Connector;
use crate::session::RemoteSession;
use crate::utils::remote_parent;
use tracing::debug;

/// Makes sure every ancestor directory of `target` exists on the remote.
///
/// Walks upward from the parent of `target`, probing each directory, and stops
/// at the first one that exists or at `remote_root`. The missing ones are then
/// created root-to-leaf. Returns how many directories were created.
///
/// A failed mkdir aborts the rest of the chain. A mkdir answered with "already
/// exists" (another client won the race) counts as success.
pub async fn reconcile<C: Connector>(
    session: &RemoteSession<C>,
    remote_root: &str,
    target: &str,
) -> Result<usize> {
    // Missing directories, leaf first.
    let mut pending: Vec<String> = Vec::new();
    let mut current = remote_parent(target);
    while let Some(dir) = current {
        if session.probe(&dir).await? {
            break;
        }
        let at_root = dir == remote_root;
        current = if at_root { None } else { remote_parent(&dir) };
        pending.push(dir);
    }

    let mut created = 0;
    for dir in pending.iter().rev() {
        match session.mkdir(dir).await {
            Ok(()) => {
                debug!("created remote directory {dir}");
                created += 1;
            }
            Err(SyncError::RemoteIo(e)) if e.kind == RemoteErrorKind::AlreadyExists => {
                debug!("remote directory {dir} appeared concurrently");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}
