//! `foldersyncctl`: one-shot commands driving the folder-sync core directly
//! against a path on disk (no running daemon required), modeled on
//! `vrift-cli`'s `Cli`/`Commands` shape.

mod doctor;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fsync_fileset::InMemoryFileSet;
use fsync_fs::StdFilesystem;
use fsync_ignore::IgnoreMatcher;
use fsync_model::ShortId;
use fsync_scanner::Scanner;
use fsync_statetracker::StateTracker;

#[derive(Parser)]
#[command(name = "foldersyncctl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a folder and report added/changed/removed counts.
    Scan {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
        /// Restrict the scan to these subpaths (whole folder if omitted).
        #[arg(long = "subpath")]
        subpaths: Vec<String>,
        #[arg(long, default_value_t = 1)]
        device_id: ShortId,
        #[arg(long, default_value_t = 128 * 1024)]
        block_size: u32,
    },
    /// Print a quick health/config summary for a folder.
    Status {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },
    /// Scan then revert local changes (receive-only or receive-encrypted).
    Revert {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
        #[arg(long, value_enum, default_value_t = RevertMode::ReceiveOnly)]
        mode: RevertMode,
        #[arg(long, default_value_t = 1)]
        device_id: ShortId,
    },
    /// Force local wins. Documented no-op outside send-only folders.
    Override {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },
    /// Dry-run the pre-pull health gate and print each check's result.
    Doctor {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
        #[arg(long, default_value = ".stfolder")]
        marker_name: String,
        #[arg(long, default_value_t = 1)]
        min_disk_free_pct: u8,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum RevertMode {
    ReceiveOnly,
    ReceiveEncrypted,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FOLDERSYNC_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            folder,
            subpaths,
            device_id,
            block_size,
        } => cmd_scan(&folder, &subpaths, device_id, block_size).await,
        Commands::Status { folder } => cmd_status(&folder),
        Commands::Revert {
            folder,
            mode,
            device_id,
        } => cmd_revert(&folder, mode, device_id).await,
        Commands::Override { folder } => {
            println!(
                "override is a no-op for {}: only send-only folders force local wins",
                folder.display()
            );
            Ok(())
        }
        Commands::Doctor {
            folder,
            marker_name,
            min_disk_free_pct,
        } => doctor::cmd_doctor(&folder, &marker_name, min_disk_free_pct),
    }
}

async fn cmd_scan(folder: &std::path::Path, subpaths: &[String], device_id: ShortId, block_size: u32) -> Result<()> {
    let fs = StdFilesystem::new(folder.to_path_buf());
    let file_set = InMemoryFileSet::new();
    let mut ignore = IgnoreMatcher::new();
    let state = StateTracker::new(folder.display().to_string());
    let scanner = Scanner::new(device_id, block_size, false);

    let stats = scanner
        .scan(&fs, &file_set, &mut ignore, &state, subpaths)
        .await?;
    println!(
        "{}: updated={} removed={} unchanged={}",
        folder.display(),
        stats.updated,
        stats.removed,
        stats.unchanged
    );
    Ok(())
}

fn cmd_status(folder: &std::path::Path) -> Result<()> {
    let config = fsync_config::Config::load_for_folder(folder)?;
    let fs = StdFilesystem::new(folder.to_path_buf());
    let gate = fsync_folder::HealthGate::new(
        config.folder.marker_name.clone(),
        config.folder.min_disk_free_pct,
    );
    match gate.check(&fs) {
        Ok(()) => println!("{}: healthy", folder.display()),
        Err(e) => println!("{}: unhealthy: {e}", folder.display()),
    }
    println!("  puller.pause_s = {}", config.puller.pause_s);
    println!("  puller.copiers = {}", config.puller.copiers);
    println!("  folder.scan_interval_s = {}", config.folder.scan_interval_s);
    Ok(())
}

async fn cmd_revert(folder: &std::path::Path, mode: RevertMode, device_id: ShortId) -> Result<()> {
    let fs = StdFilesystem::new(folder.to_path_buf());
    let file_set = InMemoryFileSet::new();
    let mut ignore = IgnoreMatcher::new();
    let state = StateTracker::new(folder.display().to_string());
    let scanner = Scanner::new(device_id, 128 * 1024, true);
    scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await?;

    let outcome = match mode {
        RevertMode::ReceiveOnly => fsync_revert::revert_receive_only(&fs, &file_set, device_id)?,
        RevertMode::ReceiveEncrypted => {
            fsync_revert::revert_receive_encrypted(&fs, &file_set, device_id, |_| false)?
        }
    };
    println!(
        "{}: reverted, {} director{} flagged for rescan",
        folder.display(),
        outcome.rescan_dirs.len(),
        if outcome.rescan_dirs.len() == 1 { "y" } else { "ies" }
    );
    for dir in &outcome.rescan_dirs {
        println!("  {dir}");
    }
    Ok(())
}
