//! Job queue holding file names awaiting the copier (§4.7).
//!
//! A name lives in exactly one of "queued" or "in progress" at a time;
//! [`JobQueue::push`] on a name already present in either set is a no-op.
//! This is the uniqueness invariant exercised by the job-queue property test
//! in §8.

use std::collections::HashSet;
use std::sync::Mutex;

use rand::seq::SliceRandom;

#[derive(Debug, Clone)]
struct Job {
    name: String,
    size: u64,
    modtime: i64,
}

struct Inner {
    queued: Vec<Job>,
    queued_names: HashSet<String>,
    in_progress: HashSet<String>,
}

pub struct JobQueue {
    inner: Mutex<Inner>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queued: Vec::new(),
                queued_names: HashSet::new(),
                in_progress: HashSet::new(),
            }),
        }
    }

    /// No-op if `name` is already queued or in progress. Returns whether the
    /// job was actually added.
    pub fn push(&self, name: impl Into<String>, size: u64, modtime: i64) -> bool {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        if inner.queued_names.contains(&name) || inner.in_progress.contains(&name) {
            return false;
        }
        inner.queued_names.insert(name.clone());
        inner.queued.push(Job { name, size, modtime });
        true
    }

    /// Removes and returns the head of the queue, moving it into the
    /// in-progress set.
    pub fn pop(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.queued.is_empty() {
            return None;
        }
        let job = inner.queued.remove(0);
        inner.queued_names.remove(&job.name);
        inner.in_progress.insert(job.name.clone());
        Some(job.name)
    }

    /// Removes `name` from the in-progress set, completing its lifecycle.
    pub fn done(&self, name: &str) {
        self.inner.lock().unwrap().in_progress.remove(name);
    }

    pub fn shuffle(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.queued.shuffle(&mut rand::thread_rng());
    }

    pub fn sort_smallest_first(&self) {
        self.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn sort_largest_first(&self) {
        self.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn sort_oldest_first(&self) {
        self.sort_by(|a, b| a.modtime.cmp(&b.modtime).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn sort_newest_first(&self) {
        self.sort_by(|a, b| b.modtime.cmp(&a.modtime).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn sort_alphabetic(&self) {
        self.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn sort_by(&self, cmp: impl Fn(&Job, &Job) -> std::cmp::Ordering) {
        let mut inner = self.inner.lock().unwrap();
        inner.queued.sort_by(cmp);
    }

    /// Moves `name` to the front of the queue if it is currently queued.
    pub fn bring_to_front(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if let Some(idx) = inner.queued.iter().position(|j| j.name == name) {
            let job = inner.queued.remove(idx);
            inner.queued.insert(0, job);
            true
        } else {
            false
        }
    }

    /// `(in_progress, queued)` names, for introspection/status reporting.
    pub fn jobs(&self) -> (Vec<String>, Vec<String>) {
        let inner = self.inner.lock().unwrap();
        let in_progress: Vec<String> = inner.in_progress.iter().cloned().collect();
        let queued: Vec<String> = inner.queued.iter().map(|j| j.name.clone()).collect();
        (in_progress, queued)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.queued.is_empty() && inner.in_progress.is_empty()
    }
}
