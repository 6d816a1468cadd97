//! Rolling history of completed replay passes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const MAX_HISTORY_SIZE: usize = 10;

/// What started a replay pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    /// Explicit request (`sync` command or `sync_now`)
    Manual,
    /// Connectivity transition to online
    Reconnect,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Reconnect => "reconnect",
        }
    }
}

/// Outcome of one replay pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub timestamp: DateTime<Utc>,
    pub trigger: SyncTrigger,
    /// Operations attempted in this pass
    pub attempted: usize,
    /// Operations applied remotely and removed from the queue
    pub flushed: usize,
    /// Ids left in the queue after a failed attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_ids: Vec<String>,
}

impl SyncRecord {
    pub fn new(
        trigger: SyncTrigger,
        attempted: usize,
        flushed: usize,
        failed_ids: Vec<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            trigger,
            attempted,
            flushed,
            failed_ids,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} sync at {}: {}/{} flushed, {} retained",
            self.trigger.as_str(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.flushed,
            self.attempted,
            self.failed_ids.len()
        )
    }
}

/// Replay history persisted to `sync-history.json`, most recent first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHistory {
    pub records: Vec<SyncRecord>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl SyncHistory {
    fn history_file_path() -> Result<PathBuf> {
        crate::config::ConfigManager::sync_history_path()
    }

    /// Load from a custom path (or the default location when `None`).
    /// A missing file yields an empty history bound to that path.
    pub fn from_path(path: Option<PathBuf>) -> Result<Self> {
        let file_path = match path {
            Some(p) => p,
            None => Self::history_file_path()?,
        };

        if !file_path.exists() {
            return Ok(Self {
                records: Vec::new(),
                path: Some(file_path),
            });
        }

        let content = fs::read_to_string(&file_path).with_context(|| {
            format!("Failed to read sync history from: {}", file_path.display())
        })?;

        let mut history: SyncHistory = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse sync history JSON from: {}", file_path.display())
        })?;
        history.path = Some(file_path);

        Ok(history)
    }

    pub fn load() -> Result<Self> {
        Self::from_path(None)
    }

    pub fn save(&self) -> Result<()> {
        let file_path = match &self.path {
            Some(p) => p.clone(),
            None => Self::history_file_path()?,
        };

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize sync history")?;

        fs::write(&file_path, content).with_context(|| {
            format!("Failed to write sync history to: {}", file_path.display())
        })?;

        Ok(())
    }

    /// Prepend a record, keep at most `MAX_HISTORY_SIZE`, and persist
    pub fn add_record(&mut self, record: SyncRecord) -> Result<()> {
        self.records.insert(0, record);
        self.records.truncate(MAX_HISTORY_SIZE);
        self.save()
    }

    pub fn last(&self) -> Option<&SyncRecord> {
        self.records.first()
    }

    pub fn list(&self) -> &[SyncRecord] {
        &self.records
    }

    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.save()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
