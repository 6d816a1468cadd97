//! User-facing notices ("toasts") for queue and connectivity events.

use colored::Colorize;
use std::sync::Mutex;

use crate::VerbosityLevel;

/// Something the operator should see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A write was accepted locally while offline
    QueuedLocally,
    WentOffline,
    /// Connectivity returned
    BackOnline,
    /// Replay is starting with this many queued operations
    SyncStarted(usize),
    /// Replay flushed this many operations
    Synced(usize),
    /// Replay left this many operations in the queue
    SyncFailed(usize),
    /// The queue file could not be written or read
    PersistenceFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Notice {
    pub fn severity(&self) -> Severity {
        match self {
            Notice::Synced(_) | Notice::BackOnline => Severity::Success,
            Notice::QueuedLocally | Notice::SyncStarted(_) => Severity::Info,
            Notice::WentOffline | Notice::SyncFailed(_) => Severity::Warning,
            Notice::PersistenceFailed(_) => Severity::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::QueuedLocally => "Saved offline. Will sync when online.".to_string(),
            Notice::WentOffline => "You are offline. Changes will sync when online.".to_string(),
            Notice::BackOnline => "Back online!".to_string(),
            Notice::SyncStarted(count) => {
                format!("Syncing {} pending {}...", count, plural(*count))
            }
            Notice::Synced(count) => {
                format!("Synced {} {} successfully.", count, plural(*count))
            }
            Notice::SyncFailed(count) => format!(
                "{} {} could not be synced and will be retried.",
                count,
                plural(*count)
            ),
            Notice::PersistenceFailed(reason) => {
                format!("Could not save offline changes: {reason}")
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "operation"
    } else {
        "operations"
    }
}

/// Channel that delivers notices to the operator
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Prints notices to the terminal; `Quiet` keeps only errors
pub struct ConsoleNotifier {
    verbosity: VerbosityLevel,
}

impl ConsoleNotifier {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let severity = notice.severity();
        let message = notice.message();

        match severity {
            Severity::Error => log::error!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            _ => log::debug!("{message}"),
        }
        crate::logger::record(&format!("notice: {message}"));

        if self.verbosity == VerbosityLevel::Quiet && severity != Severity::Error {
            return;
        }

        match severity {
            Severity::Success => println!("{} {}", "✓".green(), message.green()),
            Severity::Info => println!("{} {}", "ℹ".cyan(), message),
            Severity::Warning => println!("{} {}", "!".yellow().bold(), message.yellow()),
            Severity::Error => eprintln!("{} {}", "✗".red().bold(), message.red()),
        }
    }
}

/// Keeps every notice in memory, for embedding UIs that render their own toasts
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut n| std::mem::take(&mut *n))
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
