//! Folder runtime (§4.1): owns one folder's single-task event loop, the
//! pre-pull health gate, and the counters/events a daemon surfaces to its
//! CLI.

pub mod error;
pub mod events;
pub mod health;
pub mod metrics;
pub mod runtime;

pub use error::{FolderError, FolderHealthError};
pub use events::{EventBus, EventLogger, FolderEvent, TracingEventLogger};
pub use health::HealthGate;
pub use metrics::{FolderCounters, FolderMetrics};
pub use runtime::{FolderHandle, FolderMode, FolderRuntime, FolderRuntimeConfig};
