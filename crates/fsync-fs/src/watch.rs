use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// A filesystem change observed under a watched root, relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Changed(String),
    Created(String),
    Removed(String),
    SymlinkCreated { path: String, target: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch backend error: {0}")]
    Backend(String),
}

/// A running filesystem watch. Dropping it stops the watcher.
pub struct WatchHandle {
    events: std_mpsc::Receiver<FsEvent>,
    _watcher: RecommendedWatcher,
}

impl WatchHandle {
    /// Non-blocking poll of the next event, if any arrived since the last
    /// call. Mirrors the teacher's bridging pattern (std mpsc filled by the
    /// `notify` callback, drained from an async context) rather than
    /// spawning its own tokio task, since callers differ in how they want
    /// to multiplex this against other work.
    pub fn try_recv(&self) -> Option<FsEvent> {
        self.events.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<FsEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

fn to_fs_event(event: notify::Event, root: &std::path::Path) -> Vec<FsEvent> {
    use notify::EventKind;
    let rel = |p: &PathBuf| -> String {
        p.strip_prefix(root)
            .unwrap_or(p)
            .to_string_lossy()
            .replace('\\', "/")
    };
    match event.kind {
        EventKind::Create(_) => event.paths.iter().map(|p| FsEvent::Created(rel(p))).collect(),
        EventKind::Remove(_) => event.paths.iter().map(|p| FsEvent::Removed(rel(p))).collect(),
        EventKind::Modify(_) => event.paths.iter().map(|p| FsEvent::Changed(rel(p))).collect(),
        _ => Vec::new(),
    }
}

/// Starts a recursive watch rooted at `root`. Mirrors
/// `vrift-vdird::watch::FsWatch`'s bridge from the `notify` callback
/// (invoked on a background thread) into a channel the async folder loop
/// can poll.
pub fn watch(root: &std::path::Path) -> Result<WatchHandle, WatchError> {
    let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = raw_tx.send(res);
    })
    .map_err(|e| WatchError::Backend(e.to_string()))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| WatchError::Backend(e.to_string()))?;

    let (tx, rx) = std_mpsc::channel::<FsEvent>();
    let root = root.to_path_buf();
    std::thread::spawn(move || {
        while let Ok(res) = raw_rx.recv() {
            match res {
                Ok(event) => {
                    for fs_event in to_fs_event(event, &root) {
                        if tx.send(fs_event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(component = "fs_watch", error = %err, "watch backend error");
                }
            }
        }
    });

    Ok(WatchHandle {
        events: rx,
        _watcher: watcher,
    })
}
