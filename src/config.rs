use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "pharmacy-sync";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/pharmacy-sync or ~/.config/pharmacy-sync
    /// - macOS: ~/Library/Application Support/pharmacy-sync
    /// - Windows: %APPDATA%\pharmacy-sync
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join("Library").join("Application Support").join(APP_DIR))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join(APP_DIR))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(format!(".{APP_DIR}")))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the path of the persisted offline queue
    pub fn pending_operations_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("pending-operations.json"))
    }

    /// Get the replay history file path
    pub fn sync_history_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("sync-history.json"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("pharmacy-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}

/// Scoped environment overrides for tests that touch the config dir
#[cfg(test)]
pub(crate) mod test_env {
    use std::ffi::{OsStr, OsString};

    /// Sets an environment variable and restores the previous value on drop,
    /// including when the test panics
    pub(crate) struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        pub(crate) fn set(key: &'static str, value: impl AsRef<OsStr>) -> Self {
            let previous = std::env::var_os(key);
            std::env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_env::EnvGuard;
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_paths() {
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains("pharmacy-sync"));

        let settings = ConfigManager::settings_path().unwrap();
        assert!(settings.to_string_lossy().ends_with("config.toml"));

        let queue = ConfigManager::pending_operations_path().unwrap();
        assert!(queue.to_string_lossy().ends_with("pending-operations.json"));

        let history = ConfigManager::sync_history_path().unwrap();
        assert!(history.to_string_lossy().ends_with("sync-history.json"));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().ends_with("pharmacy-sync.log"));
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_xdg_config_home_respected() {
        let _home = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/test-xdg-config");

        let config_dir = ConfigManager::config_dir().unwrap();
        assert_eq!(config_dir, PathBuf::from("/tmp/test-xdg-config/pharmacy-sync"));
    }

    #[test]
    #[serial]
    fn test_env_guard_restores_after_panic() {
        let before = std::env::var_os("XDG_CONFIG_HOME");

        let result = std::panic::catch_unwind(|| {
            let _home = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/pharmacy-sync-panicked");
            panic!("test body failed");
        });

        assert!(result.is_err());
        assert_eq!(std::env::var_os("XDG_CONFIG_HOME"), before);
    }
}
