use std::time::Duration;

use fsync_fs::{FsEvent, WatchHandle};

/// Drains whatever events are queued on `handle` right now, without
/// blocking, and reduces them to the set of subpaths a follow-up scan
/// should cover (§4.2's watch-triggered partial scan, grounded on
/// `vrift-vdird::watch::FsWatch`'s callback-to-channel bridge).
pub fn drain_pending(handle: &WatchHandle) -> Vec<String> {
    let mut subs = Vec::new();
    while let Some(event) = handle.try_recv() {
        subs.push(event_subpath(event));
    }
    subs.sort();
    subs.dedup();
    subs
}

/// Blocks up to `timeout` for the first event, then drains anything else
/// queued behind it, coalescing a burst of events (e.g. an editor's
/// write-rename-chmod dance) into one scan request.
pub fn wait_for_batch(handle: &WatchHandle, timeout: Duration) -> Vec<String> {
    let mut subs = Vec::new();
    if let Some(event) = handle.recv_timeout(timeout) {
        subs.push(event_subpath(event));
        subs.extend(drain_pending(handle));
    }
    subs.sort();
    subs.dedup();
    subs
}

fn event_subpath(event: FsEvent) -> String {
    match event {
        FsEvent::Changed(p) | FsEvent::Created(p) | FsEvent::Removed(p) => p,
        FsEvent::SymlinkCreated { path, .. } => path,
    }
}
