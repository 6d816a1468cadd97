use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{QueueError, QueueResult};

use super::operation::QueuedOperation;

/// Durable home of the offline queue.
///
/// Every save writes the full snapshot; there is no incremental persistence.
pub trait QueueStorage: Send + Sync {
    /// Read the persisted queue, oldest first. A missing store is an empty queue.
    fn load(&self) -> QueueResult<Vec<QueuedOperation>>;

    /// Replace the persisted queue with `operations`.
    fn save(&self, operations: &[QueuedOperation]) -> QueueResult<()>;

    /// Where the queue lives, for messages.
    fn location(&self) -> PathBuf;
}

/// JSON array on disk, replaced atomically through a sibling temp file
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at the default `pending-operations.json` location
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(
            crate::config::ConfigManager::pending_operations_path()?,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure(&self, message: impl std::fmt::Display) -> QueueError {
        QueueError::Persistence {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl QueueStorage for JsonFileStorage {
    fn load(&self) -> QueueResult<Vec<QueuedOperation>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| self.failure(format!("failed to read queue: {e}")))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| self.failure(format!("failed to parse queue: {e}")))
    }

    fn save(&self, operations: &[QueuedOperation]) -> QueueResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| self.failure(format!("failed to create directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(operations)
            .map_err(|e| self.failure(format!("failed to serialize queue: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| self.failure(format!("failed to write queue: {e}")))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| self.failure(format!("failed to replace queue: {e}")))?;

        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Volatile storage for callers that do not want a file (and for tests)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    operations: Mutex<Vec<QueuedOperation>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_operations(operations: Vec<QueuedOperation>) -> Self {
        Self {
            operations: Mutex::new(operations),
        }
    }

    /// Current persisted snapshot
    pub fn snapshot(&self) -> Vec<QueuedOperation> {
        self.operations
            .lock()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }
}

impl QueueStorage for MemoryStorage {
    fn load(&self) -> QueueResult<Vec<QueuedOperation>> {
        Ok(self.snapshot())
    }

    fn save(&self, operations: &[QueuedOperation]) -> QueueResult<()> {
        let mut stored = self.operations.lock().map_err(|_| QueueError::Persistence {
            path: self.location(),
            message: "memory storage lock poisoned".to_string(),
        })?;
        *stored = operations.to_vec();
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}
