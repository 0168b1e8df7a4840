use std::collections::{HashMap, HashSet};

use fsync_activity::{reorder, DeviceActivity, ReorderStrategy};
use fsync_fileset::{DeviceId, FileSet};
use fsync_fs::Filesystem;
use fsync_ignore::IgnoreMatcher;
use fsync_jobqueue::JobQueue;
use fsync_model::{FileInfo, ShortId};
use fsync_progress::DownloadProgress;
use fsync_semaphore::ByteSemaphore;
use fsync_versioner::Versioner;
use tokio::sync::mpsc;

use crate::block_source::BlockSource;
use crate::copy_pull::{self, Candidate, CopyOutcome, GlobalBlockFinder};
use crate::directory::{apply_directory, delete_directory};
use crate::error::PullFileError;
use crate::finisher::perform_finish;
use crate::need_set::{self, NeedSet};
use crate::order::PullOrder;
use crate::shortcut::apply_shortcut;
use crate::symlink::apply_symlink;

/// Caps one pull attempt to `MAX_ITER` need-set iterations before the
/// attempt is reported as failed (§4.3).
pub const MAX_ITER: usize = 3;

/// Per-folder configuration the pipeline needs beyond its collaborators.
pub struct PullConfig {
    pub folder: String,
    pub local_device: DeviceId,
    pub ignore_delete: bool,
    pub symlinks_supported: bool,
    pub max_queue: usize,
    pub order: PullOrder,
    pub sparse_files: bool,
    pub weak_hash_threshold_pct: u8,
    pub ignore_perms: bool,
    pub min_disk_free: u64,
    pub max_conflicts: i64,
    pub self_id: ShortId,
    pub temp_prefix: String,
    pub reorder_strategy: ReorderStrategy,
}

/// Result of one pull attempt (`MAX_ITER` iterations or fewer if the
/// need-set empties out first).
#[derive(Debug, Default)]
pub struct PullOutcome {
    pub success: bool,
    pub errors: Vec<(String, String)>,
}

/// Runs one pull attempt for a folder: up to `MAX_ITER` iterations of
/// need-set enumeration, direct/rename/copy-pull handling, and db update
/// (§4.3, §5).
pub struct PullPipeline<'a> {
    pub fs: &'a dyn Filesystem,
    pub file_set: &'a dyn FileSet,
    pub ignore: &'a IgnoreMatcher,
    pub config: &'a PullConfig,
    pub connected: &'a [DeviceId],
    pub all_devices: &'a [DeviceId],
    pub activity: &'a DeviceActivity<DeviceId>,
    pub progress: &'a DownloadProgress<DeviceId>,
    pub semaphore: &'a ByteSemaphore,
    pub block_source: &'a dyn BlockSource,
    pub global_finder: &'a dyn GlobalBlockFinder,
    pub versioner: &'a dyn Versioner,
}

impl<'a> PullPipeline<'a> {
    pub async fn run_iteration(&self) -> PullOutcome {
        let mut outcome = PullOutcome {
            success: true,
            errors: Vec::new(),
        };

        for _ in 0..MAX_ITER {
            let need = need_set::enumerate(
                self.file_set,
                self.config.local_device,
                self.ignore,
                self.connected,
                self.config.ignore_delete,
                self.config.symlinks_supported,
                self.config.max_queue,
            );

            if need.process_directly.is_empty()
                && need.queued.is_empty()
                && need.file_deletions.is_empty()
                && need.directory_deletions.is_empty()
            {
                return outcome;
            }

            let (tx, rx) = mpsc::channel(256);
            let mut changed = 0usize;

            self.handle_invalidations(&need);
            self.handle_direct(&need, &tx, &mut outcome, &mut changed);
            let renamed = self.handle_renames(&need, &tx, &mut outcome, &mut changed).await;
            self.handle_file_deletions(&need, &renamed, &tx, &mut outcome, &mut changed);
            self.handle_directory_deletions(&need, &tx, &mut outcome, &mut changed);
            self.handle_queue(&need, &renamed, &tx, &mut outcome, &mut changed)
                .await;
            drop(tx);

            crate::db_updater::run(rx, self.fs, self.file_set, self.config.local_device).await;

            if !need.finished {
                continue;
            }
            if changed == 0 {
                return outcome;
            }
        }

        if !outcome.errors.is_empty() {
            outcome.success = false;
        }
        outcome
    }

    fn handle_invalidations(&self, need: &NeedSet) {
        if need.to_invalidate.is_empty() {
            return;
        }
        self.file_set
            .update(self.config.local_device, need.to_invalidate.clone());
    }

    fn handle_direct(
        &self,
        need: &NeedSet,
        tx: &mpsc::Sender<FileInfo>,
        outcome: &mut PullOutcome,
        changed: &mut usize,
    ) {
        for info in &need.process_directly {
            let result = if info.is_directory() {
                apply_directory(self.fs, info, self.config.ignore_perms)
            } else if info.is_symlink() {
                apply_symlink(self.fs, info)
            } else {
                Ok(())
            };
            match result {
                Ok(()) => {
                    let _ = tx.try_send(info.clone());
                    *changed += 1;
                }
                Err(e) => outcome.errors.push((info.name.clone(), e.to_string())),
            }
        }
    }

    /// Rename-shortcut pass (§4.3.1): a queued file whose full block list
    /// matches a pending deletion is renamed in place instead of copied or
    /// pulled. Returns the deletion names consumed this way, so the
    /// deletion pass doesn't also remove them.
    async fn handle_renames(
        &self,
        need: &NeedSet,
        tx: &mpsc::Sender<FileInfo>,
        outcome: &mut PullOutcome,
        changed: &mut usize,
    ) -> HashSet<String> {
        let mut rename_buckets = need.rename_buckets.clone();
        let mut file_deletions = need.file_deletions.clone();
        let mut consumed = HashSet::new();

        for info in &need.queued {
            if info.blocks.is_empty() {
                continue;
            }
            let Some(old_name) =
                need_set::find_rename_candidate(&mut rename_buckets, &mut file_deletions, &info.blocks)
            else {
                continue;
            };
            if self.fs.rename(&old_name, &info.name).is_err() {
                continue;
            }
            consumed.insert(old_name);

            let local_version = self
                .file_set
                .get(self.config.local_device, &info.name)
                .map(|f| f.version)
                .unwrap_or_default();
            match apply_shortcut(self.fs, info, &local_version, self.config.ignore_perms) {
                Ok(_) => {
                    let _ = tx.try_send(info.clone());
                    *changed += 1;
                }
                Err(e) => outcome.errors.push((info.name.clone(), e.to_string())),
            }
        }
        consumed
    }

    fn handle_file_deletions(
        &self,
        need: &NeedSet,
        skip: &HashSet<String>,
        tx: &mpsc::Sender<FileInfo>,
        _outcome: &mut PullOutcome,
        changed: &mut usize,
    ) {
        for (name, info) in &need.file_deletions {
            if skip.contains(name) {
                continue;
            }
            match self.fs.remove(name) {
                Ok(()) | Err(_) => {
                    let _ = tx.try_send(info.clone());
                    *changed += 1;
                }
            }
        }
    }

    fn handle_directory_deletions(
        &self,
        need: &NeedSet,
        tx: &mpsc::Sender<FileInfo>,
        outcome: &mut PullOutcome,
        changed: &mut usize,
    ) {
        let mut dirs: Vec<&FileInfo> = need.directory_deletions.iter().collect();
        dirs.sort_by_key(|f| std::cmp::Reverse(f.path_depth()));
        for info in dirs {
            let lookup = |name: &str| self.file_set.get(self.config.local_device, name);
            match delete_directory(self.fs, &info.name, self.ignore, &self.config.temp_prefix, lookup) {
                Ok(()) => {
                    let _ = tx.try_send(info.clone());
                    *changed += 1;
                }
                Err(e) => outcome.errors.push((info.name.clone(), e.to_string())),
            }
        }
    }

    async fn handle_queue(
        &self,
        need: &NeedSet,
        renamed: &HashSet<String>,
        tx: &mpsc::Sender<FileInfo>,
        outcome: &mut PullOutcome,
        changed: &mut usize,
    ) {
        let pending: Vec<&FileInfo> = need
            .queued
            .iter()
            .filter(|info| !renamed.contains(&info.name))
            .collect();
        if pending.is_empty() {
            return;
        }

        let queue = JobQueue::new();
        let mut by_name: HashMap<String, FileInfo> = HashMap::new();
        for info in &pending {
            queue.push(info.name.clone(), info.size, info.modified_s);
            by_name.insert(info.name.clone(), (*info).clone());
        }
        self.config.order.apply(&queue);

        while let Some(name) = queue.pop() {
            let info = by_name.get(&name).expect("queued name must be present").clone();
            match self.pull_one_file(&info).await {
                Ok(()) => {
                    let _ = tx.try_send(info.clone());
                    *changed += 1;
                }
                Err(e) => outcome.errors.push((info.name.clone(), e.to_string())),
            }
            queue.done(&name);
        }
    }

    async fn pull_one_file(&self, info: &FileInfo) -> Result<(), PullFileError> {
        let temp_name = format!("{}{}", self.config.temp_prefix, info.name);
        let local = self.file_set.get(self.config.local_device, &info.name);

        if local.as_ref().map(|f| f.same_content(info)).unwrap_or(false) {
            let local_version = local.map(|f| f.version).unwrap_or_default();
            apply_shortcut(self.fs, info, &local_version, self.config.ignore_perms)?;
            return Ok(());
        }

        let local_blocks: Vec<_> = local.as_ref().map(|f| f.blocks.clone()).unwrap_or_default();
        let plan = copy_pull::plan_pull(self.fs, &temp_name, &local_blocks, &info.blocks)?;

        let bytes_needed: u64 = plan
            .needed
            .iter()
            .filter_map(|&i| info.blocks.get(i))
            .map(|b| b.size as u64)
            .sum();
        copy_pull::check_disk_space(self.fs, &info.name, self.config.min_disk_free, bytes_needed)?;

        let shuffled = reorder(
            self.config.reorder_strategy,
            copy_pull::shuffle_blocks(plan.needed),
            self.all_devices,
            &self.config.local_device,
        );

        let threshold_hit = shuffled.len() * 100
            >= info.blocks.len().max(1) * self.config.weak_hash_threshold_pct as usize;
        let block_size = info
            .block_size
            .unwrap_or_else(|| info.blocks.first().map(|b| b.size).unwrap_or(0));
        let weak_index = if threshold_hit && block_size > 0 {
            Some(copy_pull::weak_hash_index_for(self.fs, &info.name, block_size))
        } else {
            None
        };
        let empty_hash = fsync_scanner::empty_block_hash(block_size);

        let mut to_pull = Vec::new();
        for &idx in &shuffled {
            let block = &info.blocks[idx];
            let copy_outcome = copy_pull::copy_block(
                self.fs,
                &temp_name,
                &info.name,
                block,
                self.config.sparse_files,
                weak_index.as_ref(),
                self.global_finder,
                empty_hash,
            )?;
            if copy_outcome == CopyOutcome::NeedsPull {
                to_pull.push(idx);
            }
        }

        for idx in to_pull {
            let block = info.blocks[idx];
            let offering = self.file_set.availability(&info.name);
            let candidates: Vec<Candidate> = copy_pull::block_candidates(
                &offering,
                self.progress,
                &self.config.folder,
                &info.name,
                &info.version,
                idx,
                self.all_devices,
            );
            copy_pull::pull_block(
                self.fs,
                self.block_source,
                self.activity,
                self.semaphore,
                &candidates,
                &self.config.folder,
                &info.name,
                &temp_name,
                &block,
            )
            .await?;
        }

        let snapshot = self.file_set.get(self.config.local_device, &info.name);
        perform_finish(
            self.fs,
            self.versioner,
            info,
            &temp_name,
            snapshot.as_ref(),
            self.config.self_id,
            self.config.max_conflicts,
            self.config.ignore_perms,
        )?;
        Ok(())
    }
}
