//! Per-remote-device download-progress tracker (§4.6/§4.7).
//!
//! Lets a local puller worker treat a block as available from a peer's
//! temp file while that peer is still mid-pull on it, rather than waiting
//! for the peer to finish and advertise a committed index entry.

use std::collections::HashSet;
use std::hash::Hash;

use dashmap::DashMap;
use fsync_model::Vector;

#[derive(Debug, Clone)]
struct FileProgress {
    version: Vector,
    indices: HashSet<usize>,
}

/// `device -> (folder, name) -> (version, block indices)`.
pub struct DownloadProgress<D: Eq + Hash> {
    entries: DashMap<D, DashMap<(String, String), FileProgress>>,
}

impl<D: Eq + Hash + Clone> Default for DownloadProgress<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Eq + Hash + Clone> DownloadProgress<D> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Appends `indices` to the named file's in-flight set. If the stored
    /// version differs from `version`, the index list is reset first (the
    /// peer started a new version of the file).
    pub fn append(
        &self,
        device: D,
        folder: &str,
        name: &str,
        version: Vector,
        indices: impl IntoIterator<Item = usize>,
    ) {
        let folder_map = self.entries.entry(device).or_default();
        let key = (folder.to_string(), name.to_string());
        let mut entry = folder_map.entry(key).or_insert_with(|| FileProgress {
            version: version.clone(),
            indices: HashSet::new(),
        });
        if entry.version != version {
            entry.version = version;
            entry.indices.clear();
        }
        entry.indices.extend(indices);
    }

    /// Removes the file entry if its stored version equals `version`; a
    /// no-op otherwise (the observed, if surprising, upstream behavior).
    pub fn forget(&self, device: &D, folder: &str, name: &str, version: &Vector) {
        if let Some(folder_map) = self.entries.get(device) {
            let key = (folder.to_string(), name.to_string());
            let remove = folder_map
                .get(&key)
                .map(|e| &e.version == version)
                .unwrap_or(false);
            if remove {
                folder_map.remove(&key);
            }
        }
    }

    /// True iff `device` has an entry for `(folder, name)` at exactly
    /// `version` that includes `index`.
    pub fn has(&self, device: &D, folder: &str, name: &str, version: &Vector, index: usize) -> bool {
        self.entries
            .get(device)
            .and_then(|folder_map| {
                let key = (folder.to_string(), name.to_string());
                folder_map
                    .get(&key)
                    .map(|e| &e.version == version && e.indices.contains(&index))
            })
            .unwrap_or(false)
    }
}
