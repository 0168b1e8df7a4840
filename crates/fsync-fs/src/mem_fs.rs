use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::meta::{EntryKind, FileMeta, Usage};
use crate::trait_def::Filesystem;

#[derive(Clone)]
enum MemEntry {
    File { data: Vec<u8>, mode: u32, modified: SystemTime },
    Dir { mode: u32 },
    Symlink { target: String },
}

/// In-memory `Filesystem`, modeled on `vrift-config::testing::TestEnvironment`'s
/// isolated-fixture philosophy: every test gets a throwaway tree with no
/// disk I/O and no cross-test interference.
pub struct MemFilesystem {
    entries: Arc<Mutex<HashMap<String, MemEntry>>>,
}

impl Default for MemFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFilesystem {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn norm(name: &str) -> String {
        name.trim_matches('/').to_string()
    }
}

impl Filesystem for MemFilesystem {
    fn lstat(&self, name: &str) -> io::Result<FileMeta> {
        let norm = Self::norm(name);
        if norm.is_empty() {
            // The root is implicit in this flat map (no entry ever names
            // it), but it always exists, matching a real filesystem root.
            return Ok(FileMeta {
                kind: EntryKind::Dir,
                size: 0,
                mode: 0o755,
                modified: SystemTime::UNIX_EPOCH,
            });
        }
        let entries = self.entries.lock().unwrap();
        match entries.get(&norm) {
            Some(MemEntry::File { data, mode, modified }) => Ok(FileMeta {
                kind: EntryKind::File,
                size: data.len() as u64,
                mode: *mode,
                modified: *modified,
            }),
            Some(MemEntry::Dir { mode }) => Ok(FileMeta {
                kind: EntryKind::Dir,
                size: 0,
                mode: *mode,
                modified: SystemTime::UNIX_EPOCH,
            }),
            Some(MemEntry::Symlink { .. }) => Ok(FileMeta {
                kind: EntryKind::Symlink,
                size: 0,
                mode: 0o777,
                modified: SystemTime::UNIX_EPOCH,
            }),
            None => Err(io::Error::new(io::ErrorKind::NotFound, name.to_string())),
        }
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&Self::norm(name)) {
            Some(MemEntry::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(_) => Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file")),
            None => Err(io::Error::new(io::ErrorKind::NotFound, name.to_string())),
        }
    }

    fn open_write(&self, name: &str) -> io::Result<Box<dyn Write + Send>> {
        let name = Self::norm(name);
        let mut entries = self.entries.lock().unwrap();
        entries.entry(name.clone()).or_insert(MemEntry::File {
            data: Vec::new(),
            mode: 0o644,
            modified: SystemTime::now(),
        });
        Ok(Box::new(MemWriteHandle {
            name,
            entries: self.entries.clone(),
        }))
    }

    fn write_at(&self, name: &str, offset: u64, data: &[u8]) -> io::Result<()> {
        let name = Self::norm(name);
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(name).or_insert(MemEntry::File {
            data: Vec::new(),
            mode: 0o644,
            modified: SystemTime::now(),
        });
        match entry {
            MemEntry::File { data: buf, .. } => {
                let end = offset as usize + data.len();
                if buf.len() < end {
                    buf.resize(end, 0);
                }
                buf[offset as usize..end].copy_from_slice(data);
                Ok(())
            }
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file")),
        }
    }

    fn mkdir(&self, name: &str, mode: u32) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(Self::norm(name), MemEntry::Dir { mode });
        Ok(())
    }

    fn mkdir_all(&self, name: &str, mode: u32) -> io::Result<()> {
        let norm = Self::norm(name);
        let mut entries = self.entries.lock().unwrap();
        let mut acc = String::new();
        for part in norm.split('/').filter(|s| !s.is_empty()) {
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(part);
            entries
                .entry(acc.clone())
                .or_insert(MemEntry::Dir { mode });
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        self.entries.lock().unwrap().remove(&Self::norm(name));
        Ok(())
    }

    fn remove_all(&self, name: &str) -> io::Result<()> {
        let prefix = Self::norm(name);
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|k, _| *k != prefix && !k.starts_with(&format!("{prefix}/")));
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(v) = entries.remove(&Self::norm(src)) {
            entries.insert(Self::norm(dst), v);
        }
        Ok(())
    }

    fn chmod(&self, name: &str, mode: u32) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&Self::norm(name)) {
            Some(MemEntry::File { mode: m, .. }) | Some(MemEntry::Dir { mode: m }) => {
                *m = mode;
                Ok(())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, name.to_string())),
        }
    }

    fn chtimes(&self, name: &str, mtime: SystemTime) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(MemEntry::File { modified, .. }) = entries.get_mut(&Self::norm(name)) {
            *modified = mtime;
        }
        Ok(())
    }

    fn lchown(&self, _name: &str, _uid: u32, _gid: u32) -> io::Result<()> {
        Ok(())
    }

    fn create_symlink(&self, target: &str, path: &str) -> io::Result<()> {
        self.entries.lock().unwrap().insert(
            Self::norm(path),
            MemEntry::Symlink {
                target: target.to_string(),
            },
        );
        Ok(())
    }

    fn dir_names(&self, name: &str) -> io::Result<Vec<String>> {
        let prefix = Self::norm(name);
        let entries = self.entries.lock().unwrap();
        let mut out = Vec::new();
        if prefix.is_empty() {
            for key in entries.keys() {
                if !key.is_empty() && !key.contains('/') {
                    out.push(key.clone());
                }
            }
            return Ok(out);
        }
        for key in entries.keys() {
            if let Some(rest) = key.strip_prefix(&format!("{prefix}/")) {
                if !rest.contains('/') {
                    out.push(rest.to_string());
                }
            }
        }
        Ok(out)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        let prefix = pattern.trim_end_matches('*');
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn usage(&self, _name: &str) -> io::Result<Usage> {
        Ok(Usage {
            free: u64::MAX / 2,
            total: u64::MAX,
        })
    }
}

struct MemWriteHandle {
    name: String,
    entries: Arc<Mutex<HashMap<String, MemEntry>>>,
}

impl Write for MemWriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(MemEntry::File { data, .. }) = entries.get_mut(&self.name) {
            data.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, self.name.clone()))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
