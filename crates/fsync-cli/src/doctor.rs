//! `foldersyncctl doctor`: dry-runs the pre-pull health gate and prints
//! each check's result, modeled on `vrift-cli`'s `doctor` command shape
//! (one line per check, pass/warn/fail tally) minus its colored-terminal
//! dependencies.

use anyhow::Result;
use std::path::Path;

use fsync_folder::{FolderHealthError, HealthGate};
use fsync_fs::{Filesystem, StdFilesystem};

pub fn cmd_doctor(folder: &Path, marker_name: &str, min_disk_free_pct: u8) -> Result<()> {
    println!("foldersync doctor: {}", folder.display());
    println!("{}", "-".repeat(40));

    let fs = StdFilesystem::new(folder.to_path_buf());
    let mut passed = 0;
    let mut failed = 0;

    match fs.lstat("") {
        Ok(_) => {
            println!("[ok]   folder path reachable");
            passed += 1;
        }
        Err(e) => {
            println!("[fail] folder path unreachable: {e}");
            failed += 1;
        }
    }

    let gate = HealthGate::new(marker_name.to_string(), min_disk_free_pct);
    match gate.check(&fs) {
        Ok(()) => {
            println!("[ok]   marker file `{marker_name}` present, disk space above {min_disk_free_pct}%");
            passed += 1;
        }
        Err(FolderHealthError::MarkerMissing(name)) => {
            println!("[fail] marker file `{name}` missing");
            failed += 1;
        }
        Err(FolderHealthError::LowDiskSpace { free_pct, min_pct }) => {
            println!("[fail] disk free {free_pct:.1}% below threshold {min_pct}%");
            failed += 1;
        }
        Err(FolderHealthError::PathUnreachable(e)) => {
            println!("[fail] path unreachable: {e}");
            failed += 1;
        }
    }

    println!("{}", "-".repeat(40));
    println!("{passed} passed, {failed} failed");
    if failed > 0 {
        anyhow::bail!("{failed} health check(s) failed");
    }
    Ok(())
}
