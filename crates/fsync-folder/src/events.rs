//! Folder events (§6 "Events emitted"), broadcast so multiple subscribers
//! (CLI `status`, future metrics exporters) can observe the same stream
//! without coordinating with the runtime loop.

use fsync_statetracker::StateChangeEvent;
use tokio::sync::broadcast;

use crate::metrics::FolderMetrics;

#[derive(Debug, Clone)]
pub enum FolderEvent {
    StateChanged(StateChangeEvent),
    LocalIndexUpdated { updated: usize, removed: usize },
    ScanCompleted { folder: String },
    PullCompleted { folder: String, success: bool },
}

/// Pluggable sink for `FolderEvent`s. The default
/// [`TracingEventLogger`] just logs; a daemon wiring metrics or a UI would
/// implement this instead.
pub trait EventLogger: Send + Sync {
    fn log(&self, event: &FolderEvent);
}

/// Default sink (§6 AMBIENT): one `tracing::info!` call per event variant,
/// matching the teacher's structured `info!(field = value, "message")`
/// call sites.
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log(&self, event: &FolderEvent) {
        match event {
            FolderEvent::StateChanged(ev) => tracing::info!(
                component = "folder",
                from = ?ev.from,
                to = ?ev.to,
                duration_s = ev.duration.as_secs_f64(),
                "state changed"
            ),
            FolderEvent::LocalIndexUpdated { updated, removed } => tracing::info!(
                component = "folder",
                updated,
                removed,
                "local index updated"
            ),
            FolderEvent::ScanCompleted { folder } => {
                tracing::info!(component = "folder", folder, "scan completed")
            }
            FolderEvent::PullCompleted { folder, success } => tracing::info!(
                component = "folder",
                folder,
                success,
                "pull attempt completed"
            ),
        }
    }
}

/// Broadcasts `FolderEvent`s to every subscriber and the default tracing
/// sink. Lagging subscribers drop old events rather than block the loop
/// (`broadcast`'s usual semantics); the runtime loop never awaits a send.
pub struct EventBus {
    tx: broadcast::Sender<FolderEvent>,
    logger: Box<dyn EventLogger>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            logger: Box::new(TracingEventLogger),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FolderEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: FolderEvent) {
        self.logger.log(&event);
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(FolderEvent::ScanCompleted { folder: "f1".to_string() });
        let ev = rx.recv().await.unwrap();
        assert!(matches!(ev, FolderEvent::ScanCompleted { folder } if folder == "f1"));
    }
}
