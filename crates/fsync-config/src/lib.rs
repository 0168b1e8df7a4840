//! # fsync-config
//!
//! Configuration for the folder-sync core and its CLI/daemon.
//!
//! Loads from, in increasing priority:
//! 1. built-in defaults
//! 2. `~/.config/foldersync/config.toml` (global)
//! 3. `<folder>/.foldersync.toml` (per-folder override)
//! 4. `FOLDERSYNC_*` environment variables

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new(Config::load().unwrap_or_else(|e| {
        eprintln!("[fsync-config] WARNING: failed to load config: {e}. Using defaults.");
        Config::default()
    }))
});

/// Read-only handle to the process-wide config.
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap()
}

/// Reloads the process-wide config from disk.
pub fn reload() -> Result<(), ConfigError> {
    *CONFIG.write().unwrap() = Config::load()?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub const CONFIG_VERSION: u32 = 1;

/// Pull order policy, serialized as a plain string so this crate doesn't
/// need to depend on `fsync-puller` for a single enum — the daemon is
/// responsible for converting this into `fsync_puller::PullOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullOrderSetting {
    Random,
    Alphabetic,
    SmallestFirst,
    LargestFirst,
    OldestFirst,
    NewestFirst,
}

impl Default for PullOrderSetting {
    fn default() -> Self {
        PullOrderSetting::Alphabetic
    }
}

/// Block-pull reorder policy, mirrored from `fsync_activity::ReorderStrategy`
/// for the same reason as [`PullOrderSetting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReorderStrategySetting {
    InOrder,
    Random,
    Standard,
}

impl Default for ReorderStrategySetting {
    fn default() -> Self {
        ReorderStrategySetting::Standard
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub config_version: u32,
    pub puller: PullerConfig,
    pub folder: FolderDefaults,
    pub daemon: DaemonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            puller: PullerConfig::default(),
            folder: FolderDefaults::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    /// Loads config for the current directory as the folder root.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_for_folder(Path::new("."))
    }

    /// Resolution order: defaults → global → per-folder → env.
    pub fn load_for_folder(folder_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        let folder_config_path = folder_root.join(".foldersync.toml");
        if folder_config_path.exists() {
            debug!("loading folder config from {:?}", folder_config_path);
            let contents = std::fs::read_to_string(&folder_config_path)?;
            let folder_config: Config = toml::from_str(&contents)?;
            config.merge(folder_config);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("foldersync/config.toml"))
    }

    /// Merges `other` into `self`; only fields that differ from `other`'s
    /// own defaults are applied, so an unset section never clobbers a more
    /// specific layer that already set it.
    fn merge(&mut self, other: Config) {
        let default_puller = PullerConfig::default();
        if other.puller.pause_s != default_puller.pause_s {
            self.puller.pause_s = other.puller.pause_s;
        }
        if other.puller.copiers != default_puller.copiers {
            self.puller.copiers = other.puller.copiers;
        }
        if other.puller.max_pending_kib != default_puller.max_pending_kib {
            self.puller.max_pending_kib = other.puller.max_pending_kib;
        }
        if other.puller.max_conflicts != default_puller.max_conflicts {
            self.puller.max_conflicts = other.puller.max_conflicts;
        }
        if other.puller.weak_hash_threshold_pct != default_puller.weak_hash_threshold_pct {
            self.puller.weak_hash_threshold_pct = other.puller.weak_hash_threshold_pct;
        }
        if other.puller.order != default_puller.order {
            self.puller.order = other.puller.order;
        }
        if other.puller.reorder != default_puller.reorder {
            self.puller.reorder = other.puller.reorder;
        }

        let default_folder = FolderDefaults::default();
        if other.folder.min_disk_free_pct != default_folder.min_disk_free_pct {
            self.folder.min_disk_free_pct = other.folder.min_disk_free_pct;
        }
        if other.folder.scan_progress_interval_s != default_folder.scan_progress_interval_s {
            self.folder.scan_progress_interval_s = other.folder.scan_progress_interval_s;
        }
        if other.folder.scan_interval_s != default_folder.scan_interval_s {
            self.folder.scan_interval_s = other.folder.scan_interval_s;
        }
        if other.folder.marker_name != default_folder.marker_name {
            self.folder.marker_name = other.folder.marker_name;
        }
        if !other.folder.ignore_patterns.is_empty() {
            self.folder.ignore_patterns = other.folder.ignore_patterns;
        }

        let default_daemon = DaemonConfig::default();
        if other.daemon.log_level != default_daemon.log_level {
            self.daemon.log_level = other.daemon.log_level;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FOLDERSYNC_PULLER_PAUSE_S") {
            if let Ok(n) = v.parse() {
                self.puller.pause_s = n;
            }
        }
        if let Ok(v) = std::env::var("FOLDERSYNC_COPIERS") {
            if let Ok(n) = v.parse() {
                self.puller.copiers = n;
            }
        }
        if let Ok(v) = std::env::var("FOLDERSYNC_MAX_PENDING_KIB") {
            if let Ok(n) = v.parse() {
                self.puller.max_pending_kib = n;
            }
        }
        if let Ok(v) = std::env::var("FOLDERSYNC_MAX_CONFLICTS") {
            if let Ok(n) = v.parse() {
                self.puller.max_conflicts = n;
            }
        }
        if let Ok(v) = std::env::var("FOLDERSYNC_MIN_DISK_FREE_PCT") {
            if let Ok(n) = v.parse() {
                self.folder.min_disk_free_pct = n;
            }
        }
        if let Ok(v) = std::env::var("FOLDERSYNC_LOG_LEVEL") {
            self.daemon.log_level = v;
        }
    }

    /// Generates a commented TOML template for `foldersyncctl init`.
    pub fn init_toml() -> String {
        let default = Config::default();
        format!(
            r#"# foldersync configuration
config_version = 1

[puller]
pause_s = {pause_s}
copiers = {copiers}
# max_pending_kib = {max_pending_kib}
# max_conflicts = {max_conflicts}

[folder]
# min_disk_free_pct = {min_disk_free_pct}
# scan_interval_s = {scan_interval_s}
marker_name = "{marker_name}"

[daemon]
# log_level = "{log_level}"
"#,
            pause_s = default.puller.pause_s,
            copiers = default.puller.copiers,
            max_pending_kib = default.puller.max_pending_kib,
            max_conflicts = default.puller.max_conflicts,
            min_disk_free_pct = default.folder.min_disk_free_pct,
            scan_interval_s = default.folder.scan_interval_s,
            marker_name = default.folder.marker_name,
            log_level = default.daemon.log_level,
        )
    }
}

/// Pull-pipeline tuning (§4.3, §10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullerConfig {
    /// Base retry backoff after a failed pull attempt.
    pub pause_s: u64,
    /// Number of concurrent block copiers/pullers.
    pub copiers: usize,
    /// Byte-semaphore capacity for in-flight pulled data.
    pub max_pending_kib: u64,
    /// `-1` means unlimited `.sync-conflict` copies kept per file.
    pub max_conflicts: i64,
    pub weak_hash_threshold_pct: u8,
    pub order: PullOrderSetting,
    pub reorder: ReorderStrategySetting,
}

impl Default for PullerConfig {
    fn default() -> Self {
        Self {
            pause_s: 60,
            copiers: 4,
            max_pending_kib: 64 * 1024,
            max_conflicts: 10,
            weak_hash_threshold_pct: 25,
            order: PullOrderSetting::default(),
            reorder: ReorderStrategySetting::default(),
        }
    }
}

/// Per-folder defaults the daemon applies unless a folder overrides them
/// (§4.1, §4.2, §10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderDefaults {
    pub min_disk_free_pct: u8,
    pub scan_interval_s: u64,
    pub scan_progress_interval_s: u64,
    pub marker_name: String,
    pub ignore_patterns: Vec<String>,
}

impl Default for FolderDefaults {
    fn default() -> Self {
        Self {
            min_disk_free_pct: 1,
            scan_interval_s: 3600,
            scan_progress_interval_s: 2,
            marker_name: ".stfolder".to_string(),
            ignore_patterns: vec![".stversions".to_string(), ".stfolder".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
