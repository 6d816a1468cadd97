use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`Settings::remote_url`]
pub const URL_ENV: &str = "PHARMACY_SYNC_URL";

/// Environment variable overriding [`Settings::api_key`]
pub const API_KEY_ENV: &str = "PHARMACY_SYNC_API_KEY";

/// Connection and sync settings stored in `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the hosted database project, e.g. `https://abc.supabase.co`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Anonymous or service API key sent as `apikey` and bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Column used to match rows for update and delete
    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Timeout for a single remote write
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for the reachability probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Seconds between probes in `watch` mode
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,

    /// Treat the remote as unreachable regardless of the probe
    #[serde(default)]
    pub force_offline: bool,
}

fn default_key_column() -> String {
    "id".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_watch_interval() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            remote_url: None,
            api_key: None,
            key_column: default_key_column(),
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            watch_interval_secs: default_watch_interval(),
            force_offline: false,
        }
    }
}

impl Settings {
    /// Load settings from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = Self::from_path(&Self::settings_path()?)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from a file, returning defaults if it does not exist
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        crate::config::ConfigManager::settings_path()
    }

    /// Overlay `PHARMACY_SYNC_URL` / `PHARMACY_SYNC_API_KEY` when set and non-empty
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(URL_ENV) {
            self.remote_url = Some(url);
        }
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.api_key = Some(key);
        }
    }

    /// Whether enough is configured to talk to the remote store
    pub fn is_configured(&self) -> bool {
        self.remote_url.is_some() && self.api_key.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Print the effective settings, hiding most of the API key
pub fn show_settings() -> Result<()> {
    let settings = Settings::load()?;
    let path = Settings::settings_path()?;

    println!("{}", "Current Configuration:".bold());
    println!("  File: {}", path.display());
    println!(
        "  Remote URL: {}",
        settings
            .remote_url
            .as_deref()
            .map(|u| u.cyan().to_string())
            .unwrap_or_else(|| "Not configured".yellow().to_string())
    );
    println!(
        "  API key: {}",
        settings
            .api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "Not configured".yellow().to_string())
    );
    println!("  Key column: {}", settings.key_column);
    println!("  Request timeout: {}s", settings.request_timeout_secs);
    println!("  Probe timeout: {}s", settings.probe_timeout_secs);
    println!("  Watch interval: {}s", settings.watch_interval_secs);
    println!(
        "  Force offline: {}",
        if settings.force_offline {
            "Yes".yellow()
        } else {
            "No".green()
        }
    );

    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::EnvGuard;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.key_column, "id");
        assert_eq!(settings.request_timeout_secs, 10);
        assert_eq!(settings.probe_timeout_secs, 3);
        assert_eq!(settings.watch_interval_secs, 5);
        assert!(!settings.force_offline);
        assert!(!settings.is_configured());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::from_path(&temp.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let settings = Settings {
            remote_url: Some("https://pharmacy.example.co".to_string()),
            api_key: Some("anon-key".to_string()),
            key_column: "uuid".to_string(),
            force_offline: true,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        let reloaded = Settings::from_path(&path).unwrap();
        assert_eq!(reloaded, settings);
        assert!(reloaded.is_configured());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "remote_url = \"https://x.example.co\"\n").unwrap();

        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.remote_url.as_deref(), Some("https://x.example.co"));
        assert_eq!(settings.key_column, "id");
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "remote_url = [").unwrap();

        let err = Settings::from_path(&path).unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let _url = EnvGuard::set(URL_ENV, "https://env.example.co");
        let _key = EnvGuard::set(API_KEY_ENV, "  ");

        let mut settings = Settings {
            api_key: Some("file-key".to_string()),
            ..Default::default()
        };
        settings.apply_env();

        assert_eq!(settings.remote_url.as_deref(), Some("https://env.example.co"));
        // blank values are ignored
        assert_eq!(settings.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_watch_interval_never_zero() {
        let settings = Settings {
            watch_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(settings.watch_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "abcd…");
        assert_eq!(mask_secret("ab"), "ab…");
    }
}
