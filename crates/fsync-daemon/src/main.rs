//! `foldersyncd`: loads config, spawns one `FolderRuntime` per folder given
//! on the command line, and runs them until Ctrl-C, modeled on
//! `vrift-vdird::run_daemon`'s consumer-first task composition and
//! `vrift-daemon::main`'s tracing/clap bootstrap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use fsync_fileset::InMemoryFileSet;
use fsync_folder::{FolderHandle, FolderMode, FolderRuntime, FolderRuntimeConfig};
use fsync_fs::StdFilesystem;
use fsync_model::ShortId;
use fsync_puller::{BlockSource, EmptyBlockFinder, PullConfig, PullOrder};
use fsync_versioner::NoopVersioner;

#[derive(Parser)]
#[command(name = "foldersyncd")]
#[command(version, about = "Folder-sync daemon", long_about = None)]
struct Cli {
    /// Folders to keep synced. Each loads its own layered config.
    #[arg(required = true)]
    folders: Vec<PathBuf>,
    #[arg(long, default_value_t = 1)]
    device_id: ShortId,
    /// Treats every folder as receive-only (local edits get reverted).
    #[arg(long)]
    receive_only: bool,
}

/// No peer connection exists (wire protocol is out of scope), so every
/// block read simply misses; the pull pipeline falls back to versioning
/// and deletion handling but never copies remote content.
struct NoPeerBlockSource;

#[async_trait::async_trait]
impl BlockSource for NoPeerBlockSource {
    async fn read_block(
        &self,
        _device: fsync_fileset::DeviceId,
        _folder: &str,
        _name: &str,
        _offset: u64,
        _size: u32,
        _strong_hash: fsync_model::StrongHash,
    ) -> std::io::Result<Vec<u8>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no connected peers to pull blocks from",
        ))
    }
}

fn pull_order(setting: fsync_config::PullOrderSetting) -> PullOrder {
    use fsync_config::PullOrderSetting as S;
    match setting {
        S::Random => PullOrder::Random,
        S::Alphabetic => PullOrder::Alphabetic,
        S::SmallestFirst => PullOrder::SmallestFirst,
        S::LargestFirst => PullOrder::LargestFirst,
        S::OldestFirst => PullOrder::OldestFirst,
        S::NewestFirst => PullOrder::NewestFirst,
    }
}

fn reorder_strategy(setting: fsync_config::ReorderStrategySetting) -> fsync_activity::ReorderStrategy {
    use fsync_config::ReorderStrategySetting as S;
    match setting {
        S::InOrder => fsync_activity::ReorderStrategy::InOrder,
        S::Random => fsync_activity::ReorderStrategy::Random,
        S::Standard => fsync_activity::ReorderStrategy::Standard,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FOLDERSYNC_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mode = if cli.receive_only {
        FolderMode::ReceiveOnly
    } else {
        FolderMode::Normal
    };

    let mut handles: Vec<(String, FolderHandle)> = Vec::with_capacity(cli.folders.len());
    let (exit_tx, mut exit_rx) = mpsc::channel::<String>(cli.folders.len().max(1));

    for folder in &cli.folders {
        let folder = folder
            .canonicalize()
            .with_context(|| format!("folder does not exist: {}", folder.display()))?;
        let folder_name = folder.display().to_string();

        let config = fsync_config::Config::load_for_folder(&folder)
            .with_context(|| format!("loading config for {folder_name}"))?;

        info!(folder = %folder_name, device_id = cli.device_id, "starting folder runtime");

        let runtime_config = FolderRuntimeConfig {
            folder: folder_name.clone(),
            local_device: cli.device_id,
            all_devices: vec![cli.device_id],
            connected: vec![],
            mode,
            block_size: 128 * 1024,
            marker_name: config.folder.marker_name.clone(),
            min_disk_free_pct: config.folder.min_disk_free_pct,
            puller_pause_s: config.puller.pause_s,
            scan_interval: std::time::Duration::from_secs(config.folder.scan_interval_s),
            byte_semaphore_capacity: config.puller.max_pending_kib * 1024,
            watch_root: Some(folder.clone()),
            pull: PullConfig {
                folder: folder_name.clone(),
                local_device: cli.device_id,
                ignore_delete: false,
                symlinks_supported: true,
                max_queue: 10_000,
                order: pull_order(config.puller.order),
                sparse_files: false,
                weak_hash_threshold_pct: config.puller.weak_hash_threshold_pct,
                ignore_perms: false,
                min_disk_free: 0,
                max_conflicts: config.puller.max_conflicts,
                self_id: cli.device_id,
                temp_prefix: ".fsync-tmp-".to_string(),
                reorder_strategy: reorder_strategy(config.puller.reorder),
            },
        };

        let fs = Arc::new(StdFilesystem::new(folder.clone()));
        let (handle, join) = FolderRuntime::spawn(
            runtime_config,
            fs,
            Arc::new(InMemoryFileSet::new()),
            Arc::new(NoPeerBlockSource),
            Arc::new(EmptyBlockFinder),
            Arc::new(NoopVersioner),
        );

        let tx = exit_tx.clone();
        let name = folder_name.clone();
        tokio::spawn(async move {
            let _ = join.await;
            let _ = tx.send(name).await;
        });

        handles.push((folder_name, handle));
    }
    drop(exit_tx);

    tokio::select! {
        Some(name) = exit_rx.recv() => {
            info!(folder = %name, "folder runtime exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping folder runtimes");
        }
    }

    for (name, handle) in &handles {
        info!(folder = %name, "stopping folder runtime");
        handle.stop().await;
    }

    Ok(())
}
