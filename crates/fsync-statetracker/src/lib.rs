//! Per-folder FSM tracking `(current state, changed_at, last error)` (§4.8).
//!
//! `set_state` refuses to enter [`FolderState::Error`] directly — only
//! `set_error` may do that, matching the source's split between a normal
//! transition path and the error path.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use fsync_model::FolderState;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateTrackerError {
    #[error("set_state must not be used to enter the error state; use set_error")]
    MustUseSetError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeEvent {
    pub from: FolderState,
    pub to: FolderState,
    pub duration: Duration,
}

struct Inner {
    current: FolderState,
    changed_at: Instant,
    err: Option<String>,
}

pub struct StateTracker {
    folder: String,
    inner: Mutex<Inner>,
}

impl StateTracker {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            inner: Mutex::new(Inner {
                current: FolderState::Idle,
                changed_at: Instant::now(),
                err: None,
            }),
        }
    }

    pub fn current(&self) -> FolderState {
        self.inner.lock().unwrap().current
    }

    pub fn err(&self) -> Option<String> {
        self.inner.lock().unwrap().err.clone()
    }

    /// Transition to any state other than `Error`. Returns `Ok(None)` if
    /// `new` equals the current state (not a "real" transition, no event).
    pub fn set_state(
        &self,
        new: FolderState,
    ) -> Result<Option<StateChangeEvent>, StateTrackerError> {
        if new.is_error() {
            return Err(StateTrackerError::MustUseSetError);
        }
        Ok(self.transition(new, None))
    }

    /// Sets the error state if `err` is `Some`, otherwise returns to `Idle`.
    pub fn set_error(&self, err: Option<String>) -> Option<StateChangeEvent> {
        let new = if err.is_some() {
            FolderState::Error
        } else {
            FolderState::Idle
        };
        self.transition(new, err)
    }

    fn transition(&self, new: FolderState, err: Option<String>) -> Option<StateChangeEvent> {
        let mut inner = self.inner.lock().unwrap();
        let from = inner.current;
        inner.err = err;
        if from == new {
            return None;
        }
        let now = Instant::now();
        let duration = now.duration_since(inner.changed_at);
        inner.current = new;
        inner.changed_at = now;
        drop(inner);

        let event = StateChangeEvent { from, to: new, duration };
        tracing::info!(
            component = "folder",
            folder = %self.folder,
            from = ?event.from,
            to = ?event.to,
            duration_s = event.duration.as_secs_f64(),
            "state changed"
        );
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_state_rejects_error() {
        let t = StateTracker::new("f1");
        let res = t.set_state(FolderState::Error);
        assert_eq!(res, Err(StateTrackerError::MustUseSetError));
    }

    #[test]
    fn set_error_enters_and_clears_error_state() {
        let t = StateTracker::new("f1");
        let ev = t.set_error(Some("boom".into())).unwrap();
        assert_eq!(ev.from, FolderState::Idle);
        assert_eq!(ev.to, FolderState::Error);
        assert_eq!(t.err(), Some("boom".into()));

        let ev2 = t.set_error(None).unwrap();
        assert_eq!(ev2.from, FolderState::Error);
        assert_eq!(ev2.to, FolderState::Idle);
        assert_eq!(t.err(), None);
    }

    #[test]
    fn no_event_on_idempotent_transition() {
        let t = StateTracker::new("f1");
        t.set_state(FolderState::Scanning).unwrap();
        let res = t.set_state(FolderState::Scanning).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn real_transition_reports_from_to() {
        let t = StateTracker::new("f1");
        let ev = t.set_state(FolderState::Scanning).unwrap().unwrap();
        assert_eq!(ev.from, FolderState::Idle);
        assert_eq!(ev.to, FolderState::Scanning);
    }
}
