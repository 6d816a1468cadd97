use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::ConfigManager;
use crate::VerbosityLevel;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Initialize console and file logging.
///
/// The console level comes from `RUST_LOG` when set, otherwise from the
/// CLI verbosity (`-q` → warn, default → info, `-v` → debug). Console output
/// goes to stderr so `pending --json` stays machine readable.
///
/// The file log lives next to the queue in the config directory
/// (`pharmacy-sync.log`) and receives every queue and replay event written
/// through [`log_to_file`].
///
/// ```bash
/// RUST_LOG=debug pharmacy-sync sync
/// RUST_LOG=off pharmacy-sync watch
/// ```
pub fn init_logger(verbosity: VerbosityLevel) -> Result<()> {
    ConfigManager::ensure_config_dir()?;
    rotate_log_if_needed()?;

    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or_else(|| verbosity.log_level());

    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();

    log_to_file(&format!("Logger initialized with level: {level:?}"))?;

    Ok(())
}

/// Append a timestamped line to the log file
pub fn log_to_file(message: &str) -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

/// Best-effort variant of [`log_to_file`] for paths that must not fail the caller
pub fn record(message: &str) {
    if let Err(e) = log_to_file(message) {
        log::debug!("Could not write to log file: {e:#}");
    }
}

/// Rename the log to `.log.old` once it grows past 10MB
pub fn rotate_log_if_needed() -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    if !log_path.exists() {
        return Ok(());
    }

    if std::fs::metadata(&log_path)?.len() > MAX_LOG_SIZE {
        let old_log_path = log_path.with_extension("log.old");
        if old_log_path.exists() {
            std::fs::remove_file(&old_log_path)?;
        }
        std::fs::rename(&log_path, &old_log_path)?;
        log::info!("Log file rotated to {}", old_log_path.display());
    }

    Ok(())
}
