//! Remote store abstraction.
//!
//! The offline queue talks to the hosted database only through
//! [`RemoteStore`], so replay can be exercised against an in-process fake.

mod postgrest;

use serde_json::Value;

use crate::error::RemoteError;
use crate::queue::{key_value, OperationKind};

pub use postgrest::PostgrestStore;

/// Rows returned by the remote store for a write
pub type Rows = Vec<Value>;

/// Table-level write operations exposed by the hosted database.
pub trait RemoteStore: Send + Sync {
    /// Insert one record.
    fn insert(&self, table: &str, record: &Value) -> Result<Rows, RemoteError>;

    /// Apply `patch` to the rows where `key_column` equals `key`.
    fn update(
        &self,
        table: &str,
        patch: &Value,
        key_column: &str,
        key: &Value,
    ) -> Result<Rows, RemoteError>;

    /// Delete the rows where `key_column` equals `key`.
    fn delete(&self, table: &str, key_column: &str, key: &Value) -> Result<Rows, RemoteError>;
}

/// Dispatch a queued or direct write to the matching remote call
pub fn apply(
    remote: &dyn RemoteStore,
    kind: OperationKind,
    table: &str,
    payload: &Value,
    key_column: &str,
) -> Result<Rows, RemoteError> {
    match kind {
        OperationKind::Insert => remote.insert(table, payload),
        OperationKind::Update => {
            let key = require_key(payload, key_column)?;
            remote.update(table, payload, key_column, key)
        }
        OperationKind::Delete => {
            let key = require_key(payload, key_column)?;
            remote.delete(table, key_column, key)
        }
    }
}

fn require_key<'a>(payload: &'a Value, key_column: &str) -> Result<&'a Value, RemoteError> {
    key_value(payload, key_column).ok_or_else(|| RemoteError::MissingKey(key_column.to_string()))
}
