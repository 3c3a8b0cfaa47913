use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    EventKind,
};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Created,
    Modified,
    Deleted,
}

/// One change under the watch root. Carries no content; uploads read the
/// file fresh at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self { kind: WatchKind::Created, path: path.into() }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self { kind: WatchKind::Modified, path: path.into() }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self { kind: WatchKind::Deleted, path: path.into() }
    }
}

/// Convert a notify::Event into zero or more WatchEvents.
///
/// Directory events are dropped. A removal is only reported if the path is
/// really gone by now.
pub fn event_to_events(event: notify::Event) -> Vec<WatchEvent> {
    let mut out = Vec::new();
    match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            for p in event.paths {
                if p.is_file() {
                    out.push(WatchEvent::created(p));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // rename move event contains two paths (from, to)
            if let [from, to] = event.paths.as_slice() {
                if !from.exists() {
                    out.push(WatchEvent::deleted(from.clone()));
                }
                if to.is_file() {
                    out.push(WatchEvent::created(to.clone()));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for p in event.paths {
                if !p.exists() {
                    out.push(WatchEvent::deleted(p));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            for p in event.paths {
                if p.is_file() {
                    out.push(WatchEvent::created(p));
                }
            }
        }
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Any) => {
            for p in event.paths {
                if p.is_file() {
                    out.push(WatchEvent::modified(p));
                }
            }
        }
        EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
            for p in event.paths {
                if !p.exists() {
                    out.push(WatchEvent::deleted(p));
                }
            }
        }
        _ => {}
    }
    out
}
