//! # pharmacy-sync
//!
//! Offline-tolerant write path for the pharmacy point-of-sale dashboard.
//!
//! ## Overview
//!
//! Sales, stock changes, purchase orders, returns, and customer edits are
//! written to a hosted database. When the counter loses its connection those
//! writes must not be lost or block the cashier: `pharmacy-sync` accepts them
//! locally, keeps them in a persisted queue, and replays them in order once
//! the remote store is reachable again.
//!
//! ## Architecture
//!
//! - The offline queue and its replay loop ([`queue`])
//! - Online/offline state and transition listeners ([`connectivity`])
//! - The hosted database's REST interface ([`remote`])
//! - Operator notices ([`notify`]) and replay history ([`history`])
//! - Configuration, settings, and logging ([`config`], [`settings`], [`logger`])
//! - CLI command handlers ([`handlers`])

/// Platform-specific configuration directory and file locations.
pub mod config;

/// Online/offline state, change listeners, and reachability probes.
///
/// Replaces the browser's `navigator.onLine` and `online`/`offline` events:
/// a [`connectivity::ConnectivityMonitor`] holds the current belief and
/// notifies subscribers on every transition.
pub mod connectivity;

/// Typed errors for queue and remote operations.
pub mod error;

/// Command handlers behind the CLI subcommands.
pub mod handlers;

/// Rolling history of replay passes, persisted next to the queue.
pub mod history;

/// Console and file logging setup with size-based rotation.
pub mod logger;

/// Toast-style notices for queue, replay, and connectivity events.
pub mod notify;

/// The offline operation queue: direct writes when online, persisted
/// buffering when offline, ordered replay on reconnect.
pub mod queue;

/// Remote store trait and the hosted database's REST client.
pub mod remote;

/// User settings in `config.toml` with environment overrides.
pub mod settings;

/// How much the CLI prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerbosityLevel {
    /// Errors only
    Quiet,
    #[default]
    Normal,
    /// Debug logging and per-operation detail
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            VerbosityLevel::Verbose
        } else if quiet {
            VerbosityLevel::Quiet
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Console log level used when `RUST_LOG` is not set
    pub fn log_level(&self) -> log::LevelFilter {
        match self {
            VerbosityLevel::Quiet => log::LevelFilter::Warn,
            VerbosityLevel::Normal => log::LevelFilter::Info,
            VerbosityLevel::Verbose => log::LevelFilter::Debug,
        }
    }
}
