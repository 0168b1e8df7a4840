//! `FileSet` — the indexed file database boundary (§3, §6). The core treats
//! this as an external collaborator; this crate supplies the trait plus an
//! in-memory implementation so the scanner, puller, and revert logic are
//! independently testable without a real on-disk index.

use dashmap::DashMap;
use fsync_model::{FileInfo, ShortId};

pub type DeviceId = ShortId;

/// Required collaborator API (§6). Implementations must guarantee that
/// `need(local)` returns exactly the names whose global version strictly
/// dominates the local device's version (§3).
pub trait FileSet: Send + Sync {
    fn update(&self, device: DeviceId, batch: Vec<FileInfo>);
    fn get(&self, device: DeviceId, name: &str) -> Option<FileInfo>;
    fn get_global(&self, name: &str) -> Option<FileInfo>;

    fn all_local(&self, device: DeviceId) -> Vec<FileInfo>;
    fn need(&self, local_device: DeviceId) -> Vec<FileInfo>;

    fn with_have(&self, device: DeviceId, cb: &mut dyn FnMut(&FileInfo)) {
        for f in self.all_local(device) {
            cb(&f);
        }
    }
    fn with_have_truncated(&self, device: DeviceId, cb: &mut dyn FnMut(&FileInfo)) {
        self.with_have(device, cb);
    }
    fn with_prefixed_have_truncated(
        &self,
        device: DeviceId,
        prefix: &str,
        cb: &mut dyn FnMut(&FileInfo),
    ) {
        for f in self.all_local(device) {
            if f.name.starts_with(prefix) {
                cb(&f);
            }
        }
    }
    fn with_need(&self, local_device: DeviceId, cb: &mut dyn FnMut(&FileInfo)) {
        for f in self.need(local_device) {
            cb(&f);
        }
    }

    fn availability(&self, name: &str) -> Vec<DeviceId>;
    fn sequence(&self, device: DeviceId) -> i64;

    /// A consistent read-only view taken at this instant; the iteration's
    /// readers all use the same snapshot (§5).
    fn snapshot(&self) -> Box<dyn FileSet>;
    fn release(&self) {}
}

/// `DashMap`-backed `FileSet`, modeled on `vrift-cas::parallel_ingest`'s use
/// of concurrent maps for lock-free reads under many producers.
#[derive(Default)]
pub struct InMemoryFileSet {
    entries: DashMap<(DeviceId, String), FileInfo>,
    sequences: DashMap<DeviceId, i64>,
}

impl InMemoryFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.key().1.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Picks the global record for `name` among all per-device entries: the
    /// one whose version is not dominated by any other's, ties broken by
    /// lowest device id. Concurrent global candidates are a conflict the
    /// pull pipeline resolves, not this layer (Open Question, see
    /// DESIGN.md).
    fn compute_global(&self, name: &str) -> Option<FileInfo> {
        let candidates: Vec<(DeviceId, FileInfo)> = self
            .entries
            .iter()
            .filter(|e| e.key().1 == name)
            .map(|e| (e.key().0, e.value().clone()))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let mut best = candidates[0].clone();
        for cand in &candidates[1..] {
            if cand.1.version.greater_equal(&best.1.version) && cand.1.version != best.1.version {
                best = cand.clone();
            } else if !best.1.version.greater_equal(&cand.1.version) && cand.0 < best.0 {
                // concurrent: deterministic tie-break by device id
                best = cand.clone();
            }
        }
        Some(best.1)
    }
}

impl FileSet for InMemoryFileSet {
    fn update(&self, device: DeviceId, batch: Vec<FileInfo>) {
        let mut max_seq = self.sequence(device);
        for file in batch {
            max_seq = max_seq.max(file.sequence);
            self.entries.insert((device, file.name.clone()), file);
        }
        self.sequences.insert(device, max_seq);
    }

    fn get(&self, device: DeviceId, name: &str) -> Option<FileInfo> {
        self.entries.get(&(device, name.to_string())).map(|e| e.clone())
    }

    fn get_global(&self, name: &str) -> Option<FileInfo> {
        self.compute_global(name)
    }

    fn all_local(&self, device: DeviceId) -> Vec<FileInfo> {
        self.entries
            .iter()
            .filter(|e| e.key().0 == device)
            .map(|e| e.value().clone())
            .collect()
    }

    fn need(&self, local_device: DeviceId) -> Vec<FileInfo> {
        let mut out = Vec::new();
        for name in self.names() {
            let Some(global) = self.compute_global(&name) else {
                continue;
            };
            let local_version = self
                .get(local_device, &name)
                .map(|f| f.version)
                .unwrap_or_default();
            if local_version.less_than(&global.version) {
                out.push(global);
            }
        }
        out
    }

    fn availability(&self, name: &str) -> Vec<DeviceId> {
        self.entries
            .iter()
            .filter(|e| e.key().1 == name && !e.value().deleted && !e.value().invalid)
            .map(|e| e.key().0)
            .collect()
    }

    fn sequence(&self, device: DeviceId) -> i64 {
        self.sequences.get(&device).map(|s| *s).unwrap_or(0)
    }

    fn snapshot(&self) -> Box<dyn FileSet> {
        let copy = InMemoryFileSet {
            entries: self.entries.clone(),
            sequences: self.sequences.clone(),
        };
        Box::new(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_model::{FileType, Vector};

    fn file(name: &str, version: Vector, seq: i64) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 0,
            permissions: 0o644,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 0,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: 0,
            version,
            sequence: seq,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        }
    }

    #[test]
    fn need_returns_files_where_global_dominates_local() {
        let fs = InMemoryFileSet::new();
        let mut remote_v = Vector::new();
        remote_v.update(2);
        fs.update(2, vec![file("a.txt", remote_v, 1)]);

        let need = fs.need(1);
        assert_eq!(need.len(), 1);
        assert_eq!(need[0].name, "a.txt");
    }

    #[test]
    fn need_is_empty_once_local_matches_global() {
        let fs = InMemoryFileSet::new();
        let mut v = Vector::new();
        v.update(2);
        fs.update(2, vec![file("a.txt", v.clone(), 1)]);
        fs.update(1, vec![file("a.txt", v, 1)]);

        assert!(fs.need(1).is_empty());
    }

    #[test]
    fn availability_lists_devices_offering_file() {
        let fs = InMemoryFileSet::new();
        let mut v = Vector::new();
        v.update(2);
        fs.update(2, vec![file("a.txt", v.clone(), 1)]);
        fs.update(3, vec![file("a.txt", v, 1)]);
        let mut avail = fs.availability("a.txt");
        avail.sort();
        assert_eq!(avail, vec![2, 3]);
    }

    #[test]
    fn sequence_tracks_highest_seen() {
        let fs = InMemoryFileSet::new();
        fs.update(1, vec![file("a", Vector::new(), 5)]);
        fs.update(1, vec![file("b", Vector::new(), 3)]);
        assert_eq!(fs.sequence(1), 5);
    }

    #[test]
    fn snapshot_is_independent_of_later_writes() {
        let fs = InMemoryFileSet::new();
        fs.update(1, vec![file("a", Vector::new(), 1)]);
        let snap = fs.snapshot();
        fs.update(1, vec![file("b", Vector::new(), 2)]);
        assert!(snap.get(1, "b").is_none());
        assert!(fs.get(1, "b").is_some());
    }
}
