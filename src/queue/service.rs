use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connectivity::{ConnectivityMonitor, ConnectivityState, Subscription};
use crate::error::{QueueError, QueueResult, RemoteError};
use crate::history::{SyncHistory, SyncRecord, SyncTrigger};
use crate::notify::{Notice, Notifier};
use crate::remote::{self, RemoteStore, Rows};

use super::operation::{key_value, OperationKind, QueuedOperation};
use super::storage::QueueStorage;

/// Result of a write through [`OfflineQueue::execute_operation`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Applied by the remote store; carries the rows it returned
    Confirmed(Rows),
    /// Accepted locally while offline; durable only once replayed
    QueuedLocally(QueuedOperation),
}

impl WriteOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteOutcome::Confirmed(_))
    }

    /// Rows to show the caller. A queued write echoes its own payload.
    pub fn rows(&self) -> Rows {
        match self {
            WriteOutcome::Confirmed(rows) => rows.clone(),
            WriteOutcome::QueuedLocally(op) => vec![op.payload.clone()],
        }
    }
}

/// An operation that stayed queued after a replay attempt
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub id: String,
    pub error: RemoteError,
}

/// Summary of one replay pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub attempted: usize,
    /// Ids applied remotely and removed, in replay order
    pub flushed: Vec<String>,
    pub failed: Vec<FailedOperation>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    NothingPending,
    /// Another replay holds the in-progress flag
    AlreadyRunning,
    Completed(SyncReport),
}

/// Clears the in-progress flag however replay exits
struct ReplayGuard<'a>(&'a AtomicBool);

impl<'a> ReplayGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ReplayGuard(flag))
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single write path to the remote store with an offline queue behind it.
///
/// Online writes go straight to the remote store. Offline writes are
/// appended to the queue and persisted; [`OfflineQueue::sync_pending`]
/// replays them in enqueue order and drops each one the remote confirms.
///
/// Remote calls are never made while the queue lock is held, so writes can
/// be enqueued while a replay is in flight; replay removes by id and keeps
/// anything appended after its snapshot.
pub struct OfflineQueue {
    operations: Mutex<Vec<QueuedOperation>>,
    storage: Box<dyn QueueStorage>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    notifier: Arc<dyn Notifier>,
    key_column: String,
    syncing: AtomicBool,
    history: Option<Mutex<SyncHistory>>,
}

impl OfflineQueue {
    /// Rehydrate the queue from `storage`.
    ///
    /// A storage that cannot be read is an error; the queue is never
    /// silently reset.
    pub fn open(
        storage: Box<dyn QueueStorage>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        notifier: Arc<dyn Notifier>,
    ) -> QueueResult<Self> {
        let operations = storage.load()?;
        if !operations.is_empty() {
            log::info!(
                "Loaded {} pending operation(s) from {}",
                operations.len(),
                storage.location().display()
            );
        }

        Ok(Self {
            operations: Mutex::new(operations),
            storage,
            remote,
            connectivity,
            notifier,
            key_column: "id".to_string(),
            syncing: AtomicBool::new(false),
            history: None,
        })
    }

    /// Match updates and deletes on `column` instead of `id`
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Record every completed replay pass in `history`
    pub fn with_history(mut self, history: SyncHistory) -> Self {
        self.history = Some(Mutex::new(history));
        self
    }

    /// Write `payload` to `target`, or queue it when offline.
    ///
    /// Online failures are returned to the caller and never queued.
    pub fn execute_operation(
        &self,
        kind: OperationKind,
        target: &str,
        payload: Value,
    ) -> QueueResult<WriteOutcome> {
        self.validate(kind, target, &payload)?;

        if self.connectivity.is_online() {
            log::debug!("Executing {kind} on '{target}' directly");
            return remote::apply(self.remote.as_ref(), kind, target, &payload, &self.key_column)
                .map(WriteOutcome::Confirmed)
                .map_err(|source| {
                    log::error!("Operation error on '{target}': {source}");
                    QueueError::Remote {
                        table: target.to_string(),
                        source,
                    }
                });
        }

        let operation = QueuedOperation::new(kind, target, payload);
        self.enqueue(operation.clone())?;
        self.notifier.notify(Notice::QueuedLocally);
        Ok(WriteOutcome::QueuedLocally(operation))
    }

    /// Replay the queue on explicit request
    pub fn sync_pending(&self) -> QueueResult<ReplayOutcome> {
        self.replay(SyncTrigger::Manual)
    }

    /// Alias of [`OfflineQueue::sync_pending`]
    pub fn sync_now(&self) -> QueueResult<ReplayOutcome> {
        self.sync_pending()
    }

    /// Replay queued operations in enqueue order.
    ///
    /// Failed operations stay queued and do not stop the pass. No-op when the
    /// queue is empty or another replay is running.
    pub fn replay(&self, trigger: SyncTrigger) -> QueueResult<ReplayOutcome> {
        if self.pending_count() == 0 {
            return Ok(ReplayOutcome::NothingPending);
        }

        let Some(_guard) = ReplayGuard::acquire(&self.syncing) else {
            log::debug!("Replay already in progress, skipping");
            return Ok(ReplayOutcome::AlreadyRunning);
        };

        let snapshot = self.pending();
        log::info!("Replaying {} pending operation(s)", snapshot.len());
        self.notifier.notify(Notice::SyncStarted(snapshot.len()));

        let mut flushed = Vec::new();
        let mut failed = Vec::new();
        for op in &snapshot {
            match remote::apply(
                self.remote.as_ref(),
                op.kind,
                &op.target,
                &op.payload,
                &self.key_column,
            ) {
                Ok(_) => {
                    log::debug!("Replayed {}", op.summary());
                    flushed.push(op.id.clone());
                }
                Err(error) => {
                    log::error!("Sync error for operation {}: {}", op.summary(), error);
                    failed.push(FailedOperation {
                        id: op.id.clone(),
                        error,
                    });
                }
            }
        }

        let persisted = if flushed.is_empty() {
            Ok(())
        } else {
            self.remove_applied(&flushed)
        };

        if !flushed.is_empty() {
            self.notifier.notify(Notice::Synced(flushed.len()));
        }
        if !failed.is_empty() {
            self.notifier.notify(Notice::SyncFailed(failed.len()));
        }

        let report = SyncReport {
            trigger,
            attempted: snapshot.len(),
            flushed,
            failed,
        };
        self.record_history(&report);

        persisted?;
        Ok(ReplayOutcome::Completed(report))
    }

    /// Subscribe to connectivity so that going online replays the queue.
    ///
    /// The listener holds only a weak reference; dropping the queue makes it inert.
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let queue = Arc::downgrade(self);
        self.connectivity.subscribe(move |state| {
            let Some(queue) = queue.upgrade() else {
                return;
            };
            match state {
                ConnectivityState::Online => {
                    queue.notifier.notify(Notice::BackOnline);
                    if let Err(e) = queue.replay(SyncTrigger::Reconnect) {
                        log::error!("Automatic sync failed: {e}");
                    }
                }
                ConnectivityState::Offline => queue.notifier.notify(Notice::WentOffline),
            }
        })
    }

    pub fn detach(&self, subscription: Subscription) -> bool {
        self.connectivity.unsubscribe(subscription)
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.lock_operations().map(|ops| ops.len()).unwrap_or(0)
    }

    /// Queued operations, oldest first
    pub fn pending(&self) -> Vec<QueuedOperation> {
        self.lock_operations()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    pub fn storage_location(&self) -> PathBuf {
        self.storage.location()
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    fn validate(&self, kind: OperationKind, target: &str, payload: &Value) -> QueueResult<()> {
        if target.trim().is_empty() {
            return Err(QueueError::InvalidOperation(
                "target table must not be empty".to_string(),
            ));
        }
        if kind.needs_key() && key_value(payload, &self.key_column).is_none() {
            return Err(QueueError::InvalidOperation(format!(
                "{kind} on '{target}' needs a '{}' value in the payload",
                self.key_column
            )));
        }
        Ok(())
    }

    /// Append and persist; the append is undone if the snapshot cannot be written
    fn enqueue(&self, operation: QueuedOperation) -> QueueResult<()> {
        let result = {
            let mut ops = self.lock_operations()?;
            ops.push(operation.clone());
            let saved = self.storage.save(&ops);
            if saved.is_err() {
                ops.pop();
            }
            saved
        };

        match result {
            Ok(()) => {
                log::info!("Queued {}", operation.summary());
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Notice::PersistenceFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Filter out applied ids and persist the remainder
    fn remove_applied(&self, applied: &[String]) -> QueueResult<()> {
        let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();
        let result = {
            let mut ops = self.lock_operations()?;
            ops.retain(|op| !applied.contains(op.id.as_str()));
            self.storage.save(&ops)
        };

        if let Err(e) = &result {
            // the remote already has these writes; a stale file would replay them again
            self.notifier.notify(Notice::PersistenceFailed(e.to_string()));
        }
        result
    }

    fn record_history(&self, report: &SyncReport) {
        let Some(history) = &self.history else {
            return;
        };
        let record = SyncRecord::new(
            report.trigger,
            report.attempted,
            report.flushed.len(),
            report.failed.iter().map(|f| f.id.clone()).collect(),
        );
        match history.lock() {
            Ok(mut history) => {
                if let Err(e) = history.add_record(record) {
                    log::warn!("Failed to record sync history: {e:#}");
                }
            }
            Err(_) => log::warn!("Sync history lock poisoned"),
        }
    }

    fn lock_operations(&self) -> QueueResult<MutexGuard<'_, Vec<QueuedOperation>>> {
        self.operations.lock().map_err(|_| QueueError::Persistence {
            path: self.storage.location(),
            message: "queue lock poisoned".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingNotifier;
    use crate::queue::{JsonFileStorage, MemoryStorage};
    use serde_json::json;
    use tempfile::TempDir;

    /// Accepts every write and remembers it
    #[derive(Default)]
    struct AcceptAll {
        calls: Mutex<Vec<(OperationKind, String, Value)>>,
    }

    impl RemoteStore for AcceptAll {
        fn insert(&self, table: &str, record: &Value) -> Result<Rows, RemoteError> {
            self.record(OperationKind::Insert, table, record.clone());
            Ok(vec![json!({"id": 1})])
        }

        fn update(
            &self,
            table: &str,
            patch: &Value,
            _: &str,
            _: &Value,
        ) -> Result<Rows, RemoteError> {
            self.record(OperationKind::Update, table, patch.clone());
            Ok(vec![patch.clone()])
        }

        fn delete(&self, table: &str, col: &str, key: &Value) -> Result<Rows, RemoteError> {
            let mut matched = serde_json::Map::new();
            matched.insert(col.to_string(), key.clone());
            self.record(OperationKind::Delete, table, Value::Object(matched));
            Ok(vec![])
        }
    }

    impl AcceptAll {
        fn record(&self, kind: OperationKind, table: &str, value: Value) {
            self.calls.lock().unwrap().push((kind, table.to_string(), value));
        }
    }

    /// Storage whose writes always fail
    struct ReadOnlyStorage;

    impl QueueStorage for ReadOnlyStorage {
        fn load(&self) -> QueueResult<Vec<QueuedOperation>> {
            Ok(Vec::new())
        }

        fn save(&self, _: &[QueuedOperation]) -> QueueResult<()> {
            Err(QueueError::Persistence {
                path: self.location(),
                message: "quota exceeded".to_string(),
            })
        }

        fn location(&self) -> PathBuf {
            PathBuf::from("/read-only/pending-operations.json")
        }
    }

    /// Accepts a fixed number of saves, then fails like a full disk
    struct FillingStorage {
        saves_left: Mutex<usize>,
        on_disk: Mutex<Vec<QueuedOperation>>,
    }

    impl FillingStorage {
        fn new(saves_left: usize) -> Arc<Self> {
            Arc::new(Self {
                saves_left: Mutex::new(saves_left),
                on_disk: Mutex::new(Vec::new()),
            })
        }
    }

    impl QueueStorage for Arc<FillingStorage> {
        fn load(&self) -> QueueResult<Vec<QueuedOperation>> {
            Ok(self.on_disk.lock().unwrap().clone())
        }

        fn save(&self, operations: &[QueuedOperation]) -> QueueResult<()> {
            let mut left = self.saves_left.lock().unwrap();
            if *left == 0 {
                return Err(QueueError::Persistence {
                    path: self.location(),
                    message: "no space left on device".to_string(),
                });
            }
            *left -= 1;
            *self.on_disk.lock().unwrap() = operations.to_vec();
            Ok(())
        }

        fn location(&self) -> PathBuf {
            PathBuf::from("/full-disk/pending-operations.json")
        }
    }

    fn queue_with(
        storage: Box<dyn QueueStorage>,
        state: ConnectivityState,
    ) -> (OfflineQueue, Arc<AcceptAll>, Arc<CollectingNotifier>) {
        let remote = Arc::new(AcceptAll::default());
        let notifier = Arc::new(CollectingNotifier::new());
        let queue = OfflineQueue::open(
            storage,
            remote.clone(),
            Arc::new(ConnectivityMonitor::new(state)),
            notifier.clone(),
        )
        .unwrap();
        (queue, remote, notifier)
    }

    #[test]
    fn test_online_write_is_confirmed() {
        let (queue, remote, notifier) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Online);

        let outcome = queue
            .execute_operation(OperationKind::Insert, "medicines", json!({"name": "Amoxicillin"}))
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.rows(), vec![json!({"id": 1})]);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(remote.calls.lock().unwrap().len(), 1);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn test_offline_write_is_queued_and_echoed() {
        let (queue, remote, notifier) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Offline);
        let payload = json!({"name": "Paracetamol", "stock": 100});

        let outcome = queue
            .execute_operation(OperationKind::Insert, "medicines", payload.clone())
            .unwrap();

        assert!(!outcome.is_confirmed());
        assert_eq!(outcome.rows(), vec![payload]);
        assert_eq!(queue.pending_count(), 1);
        assert!(remote.calls.lock().unwrap().is_empty());
        assert_eq!(notifier.notices(), vec![Notice::QueuedLocally]);
    }

    #[test]
    fn test_validation_happens_before_queueing() {
        let (queue, _remote, _) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Offline);

        let err = queue
            .execute_operation(OperationKind::Insert, "  ", json!({}))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidOperation(_)));

        let err = queue
            .execute_operation(OperationKind::Update, "medicines", json!({"stock": 5}))
            .unwrap_err();
        assert!(err.to_string().contains("'id'"));

        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_custom_key_column() {
        let (queue, remote, _) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Online);
        let queue = queue.with_key_column("sku");

        queue
            .execute_operation(OperationKind::Delete, "medicines", json!({"sku": "PCM-500"}))
            .unwrap();

        let calls = remote.calls.lock().unwrap();
        assert_eq!(calls[0].2, json!({"sku": "PCM-500"}));
    }

    #[test]
    fn test_persistence_failure_rolls_back_enqueue() {
        let (queue, _remote, notifier) =
            queue_with(Box::new(ReadOnlyStorage), ConnectivityState::Offline);

        let err = queue
            .execute_operation(OperationKind::Insert, "sales", json!({"total": 9.5}))
            .unwrap_err();

        assert!(matches!(err, QueueError::Persistence { .. }));
        assert_eq!(queue.pending_count(), 0);
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(
            matches!(notices[0], Notice::PersistenceFailed(ref m) if m.contains("quota exceeded"))
        );
    }

    #[test]
    fn test_replay_persistence_failure_still_drops_applied_operations() {
        let storage = FillingStorage::new(1);
        let (queue, remote, notifier) =
            queue_with(Box::new(storage.clone()), ConnectivityState::Offline);

        queue
            .execute_operation(OperationKind::Insert, "sales", json!({"total": 12.75}))
            .unwrap();
        queue.connectivity().set_state(ConnectivityState::Online);

        let err = queue.sync_pending().unwrap_err();

        assert!(matches!(err, QueueError::Persistence { .. }));
        assert_eq!(remote.calls.lock().unwrap().len(), 1);
        assert_eq!(queue.pending_count(), 0);
        assert!(!queue.is_syncing());
        // the file still holds the applied write
        assert_eq!(storage.load().unwrap().len(), 1);

        let notices = notifier.notices();
        assert_eq!(notices.len(), 4);
        assert_eq!(notices[0], Notice::QueuedLocally);
        assert_eq!(notices[1], Notice::SyncStarted(1));
        assert!(
            matches!(notices[2], Notice::PersistenceFailed(ref m) if m.contains("no space left"))
        );
        assert_eq!(notices[3], Notice::Synced(1));
    }

    #[test]
    fn test_open_rejects_corrupt_queue_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pending-operations.json");
        std::fs::write(&path, "[{").unwrap();

        let result = OfflineQueue::open(
            Box::new(JsonFileStorage::new(&path)),
            Arc::new(AcceptAll::default()),
            Arc::new(ConnectivityMonitor::new(ConnectivityState::Online)),
            Arc::new(CollectingNotifier::new()),
        );
        assert!(matches!(result, Err(QueueError::Persistence { .. })));
    }

    #[test]
    fn test_replay_of_empty_queue_is_noop() {
        let (queue, _remote, notifier) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Online);
        assert_eq!(queue.sync_pending().unwrap(), ReplayOutcome::NothingPending);
        assert!(notifier.notices().is_empty());
        assert!(!queue.is_syncing());
    }

    #[test]
    fn test_replay_records_history() {
        let temp = TempDir::new().unwrap();
        let history_path = temp.path().join("sync-history.json");
        let (queue, _remote, notifier) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Offline);
        let history = SyncHistory::from_path(Some(history_path.clone())).unwrap();
        let queue = queue.with_history(history);

        queue
            .execute_operation(OperationKind::Delete, "customers", json!({"id": 4}))
            .unwrap();
        queue.sync_now().unwrap();
        assert_eq!(
            notifier.notices(),
            vec![Notice::QueuedLocally, Notice::SyncStarted(1), Notice::Synced(1)]
        );

        let history = SyncHistory::from_path(Some(history_path)).unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.trigger, SyncTrigger::Manual);
        assert_eq!(last.attempted, 1);
        assert_eq!(last.flushed, 1);
    }

    #[test]
    fn test_attach_notifies_going_offline() {
        let (queue, _remote, notifier) =
            queue_with(Box::new(MemoryStorage::new()), ConnectivityState::Online);
        let queue = Arc::new(queue);
        let sub = queue.attach();

        queue.connectivity().set_state(ConnectivityState::Offline);
        assert_eq!(notifier.drain(), vec![Notice::WentOffline]);

        assert!(queue.detach(sub));
        queue.connectivity().set_state(ConnectivityState::Online);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn test_replay_guard_resets_flag() {
        let flag = AtomicBool::new(false);
        {
            let guard = ReplayGuard::acquire(&flag);
            assert!(guard.is_some());
            assert!(ReplayGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
