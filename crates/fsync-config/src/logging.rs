//! Component-tagged logging macros and subscriber init, one family per
//! binary/subsystem, mirroring `vrift_config::logging`'s
//! `log_daemon_info!`-style shape exactly.

/// Log levels for runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[macro_export]
macro_rules! log_folder_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "folder", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_folder_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "folder", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_folder_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "folder", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_folder_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "folder", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_scan_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "scan", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_pull_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "pull", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_pull_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "pull", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "cli", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_daemon_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "daemon", $($key = $value,)* $msg)
    };
}

/// Initializes the global `tracing` subscriber. Call once at binary entry.
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
