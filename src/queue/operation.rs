use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of write against a remote table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    /// Returns a human-readable string representation
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }

    /// Update and delete locate their row through the key column
    pub fn needs_key(&self) -> bool {
        !matches!(self, OperationKind::Insert)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write buffered locally while offline.
///
/// The serialized field names (`type`, `table`, `data`, `timestamp`) are the
/// on-disk format of `pending-operations.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// `<unix-millis>-<random suffix>`
    pub id: String,

    #[serde(rename = "type")]
    pub kind: OperationKind,

    #[serde(rename = "table")]
    pub target: String,

    /// Full record for inserts and updates, at least the key for deletes
    #[serde(rename = "data")]
    pub payload: Value,

    /// Unix milliseconds at enqueue time
    #[serde(rename = "timestamp")]
    pub enqueued_at: i64,
}

impl QueuedOperation {
    /// Create a new pending operation stamped with the current time
    pub fn new(kind: OperationKind, target: impl Into<String>, payload: Value) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: generate_id(now),
            kind,
            target: target.into(),
            payload,
            enqueued_at: now,
        }
    }

    /// Value of `key_column` in the payload, if present and not null
    pub fn key_value(&self, key_column: &str) -> Option<&Value> {
        key_value(&self.payload, key_column)
    }

    /// One-line description used in listings and logs
    pub fn summary(&self) -> String {
        let when = chrono::DateTime::from_timestamp_millis(self.enqueued_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.enqueued_at.to_string());
        format!("{} {} on '{}' queued at {}", self.id, self.kind, self.target, when)
    }
}

/// Look up a non-null key in a JSON object payload
pub fn key_value<'a>(payload: &'a Value, key_column: &str) -> Option<&'a Value> {
    payload.get(key_column).filter(|v| !v.is_null())
}

fn generate_id(now_millis: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now_millis, &suffix[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(OperationKind::Insert, "insert", false)]
    #[case(OperationKind::Update, "update", true)]
    #[case(OperationKind::Delete, "delete", true)]
    fn test_operation_kind(#[case] kind: OperationKind, #[case] name: &str, #[case] keyed: bool) {
        assert_eq!(kind.as_str(), name);
        assert_eq!(kind.needs_key(), keyed);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
    }

    #[test]
    fn test_new_operation_fields() {
        let before = Utc::now().timestamp_millis();
        let op = QueuedOperation::new(
            OperationKind::Insert,
            "medicines",
            json!({"name": "Paracetamol", "stock": 100}),
        );

        assert_eq!(op.kind, OperationKind::Insert);
        assert_eq!(op.target, "medicines");
        assert!(op.enqueued_at >= before);
        assert!(op.id.starts_with(&op.enqueued_at.to_string()));
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: std::collections::HashSet<String> = (0..500)
            .map(|_| QueuedOperation::new(OperationKind::Delete, "sales", json!({"id": 1})).id)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_wire_field_names() {
        let op = QueuedOperation {
            id: "1700000000000-abc".to_string(),
            kind: OperationKind::Update,
            target: "customers".to_string(),
            payload: json!({"id": 7, "phone": "555-0100"}),
            enqueued_at: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1700000000000-abc",
                "type": "update",
                "table": "customers",
                "data": {"id": 7, "phone": "555-0100"},
                "timestamp": 1_700_000_000_000_i64
            })
        );
    }

    #[test]
    fn test_key_value_ignores_null() {
        let op = QueuedOperation::new(OperationKind::Delete, "sales", json!({"id": null}));
        assert!(op.key_value("id").is_none());

        let op = QueuedOperation::new(OperationKind::Delete, "sales", json!({"id": "s-1"}));
        assert_eq!(op.key_value("id"), Some(&json!("s-1")));
        assert!(op.key_value("uuid").is_none());
    }

    #[test]
    fn test_summary_mentions_kind_and_table() {
        let op = QueuedOperation::new(OperationKind::Insert, "purchase_orders", json!({}));
        let summary = op.summary();
        assert!(summary.contains("insert"));
        assert!(summary.contains("purchase_orders"));
        assert!(summary.contains("UTC"));
    }
}
