//! Wiring shared by every command that touches the queue.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe, ConnectivityState};
use crate::history::SyncHistory;
use crate::notify::ConsoleNotifier;
use crate::queue::{JsonFileStorage, OfflineQueue};
use crate::remote::PostgrestStore;
use crate::settings::Settings;
use crate::VerbosityLevel;

/// The queue service plus the collaborators it was built from
pub struct SyncContext {
    pub settings: Settings,
    pub store: Arc<PostgrestStore>,
    pub queue: Arc<OfflineQueue>,
    /// Set by `--offline` or `force_offline`; probes are skipped
    pub forced_offline: bool,
}

impl SyncContext {
    /// Load settings, probe the remote once, and rehydrate the queue
    pub fn open(verbosity: VerbosityLevel, force_offline: bool) -> Result<Self> {
        let settings = Settings::load()?;
        let store = Arc::new(PostgrestStore::from_settings(&settings)?);
        let forced_offline = force_offline || settings.force_offline;

        let initial = if forced_offline {
            ConnectivityState::Offline
        } else {
            store.probe()
        };
        log::debug!("Initial connectivity: {}", initial.as_str());

        let storage = JsonFileStorage::open_default()?;
        let history = SyncHistory::load().context("Failed to load sync history")?;

        let queue = OfflineQueue::open(
            Box::new(storage),
            store.clone(),
            Arc::new(ConnectivityMonitor::new(initial)),
            Arc::new(ConsoleNotifier::new(verbosity)),
        )
        .context("Failed to open the offline queue")?
        .with_key_column(settings.key_column.clone())
        .with_history(history);

        Ok(Self {
            settings,
            store,
            queue: Arc::new(queue),
            forced_offline,
        })
    }

    /// Re-probe the remote and feed the result to the connectivity monitor
    pub fn refresh_connectivity(&self) -> ConnectivityState {
        if self.forced_offline {
            return self.queue.connectivity().state();
        }
        self.queue.connectivity().refresh(self.store.as_ref())
    }
}
