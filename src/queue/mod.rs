//! Offline operation queue.
//!
//! Buffers inserts, updates, and deletes against the remote store while
//! connectivity is unavailable, persists them locally, and replays them in
//! enqueue order once connectivity returns.

mod operation;
mod service;
mod storage;

pub use operation::{key_value, OperationKind, QueuedOperation};
pub use service::{FailedOperation, OfflineQueue, ReplayOutcome, SyncReport, WriteOutcome};
pub use storage::{JsonFileStorage, MemoryStorage, QueueStorage};
