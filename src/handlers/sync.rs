//! Replay, status, pending listing, and watch commands.

use anyhow::{Context, Result};
use colored::Colorize;
use std::thread;

use crate::history::{SyncHistory, SyncTrigger};
use crate::queue::{JsonFileStorage, QueueStorage, ReplayOutcome, SyncReport};
use crate::VerbosityLevel;

use super::context::SyncContext;

/// Maximum number of queued operations shown by `status`
const MAX_PENDING_TO_DISPLAY: usize = 10;

/// Probe the remote and replay the queue if it is reachable
pub fn handle_sync(verbosity: VerbosityLevel) -> Result<()> {
    let ctx = SyncContext::open(verbosity, false)?;

    if !ctx.refresh_connectivity().is_online() {
        println!(
            "{} Remote unreachable; {} operation(s) remain queued",
            "!".yellow().bold(),
            ctx.queue.pending_count()
        );
        return Ok(());
    }

    let outcome = ctx.queue.sync_pending()?;
    print_outcome(&outcome, verbosity);
    Ok(())
}

fn print_outcome(outcome: &ReplayOutcome, verbosity: VerbosityLevel) {
    match outcome {
        ReplayOutcome::NothingPending => {
            if verbosity != VerbosityLevel::Quiet {
                println!("{}", "Nothing to sync".green());
            }
        }
        ReplayOutcome::AlreadyRunning => {
            println!("{}", "A sync is already in progress".yellow());
        }
        ReplayOutcome::Completed(report) => print_report(report, verbosity),
    }
}

fn print_report(report: &SyncReport, verbosity: VerbosityLevel) {
    crate::logger::record(&format!(
        "{} sync: {} of {} flushed",
        report.trigger.as_str(),
        report.flushed.len(),
        report.attempted
    ));

    if verbosity == VerbosityLevel::Quiet {
        return;
    }

    println!(
        "  {} {}/{}",
        "Flushed:".dimmed(),
        report.flushed.len().to_string().green(),
        report.attempted
    );
    if !report.is_clean() {
        println!("  {}", "Still queued:".yellow());
        for failed in &report.failed {
            println!("    {} {}", failed.id, failed.error.to_string().dimmed());
        }
    }
}

/// Connectivity, queue size, and the last replay
pub fn handle_status(verbosity: VerbosityLevel) -> Result<()> {
    let ctx = SyncContext::open(verbosity, false)?;
    let history = SyncHistory::load()?;
    let pending = ctx.queue.pending();

    println!("{}", "=== Pharmacy Sync Status ===".bold().cyan());
    println!();
    println!("{}", "Remote:".bold());
    println!("  URL: {}", ctx.store.base_url());
    println!(
        "  Connectivity: {}",
        if ctx.forced_offline {
            "Offline (forced)".yellow()
        } else if ctx.queue.is_online() {
            "Online".green()
        } else {
            "Offline".yellow()
        }
    );

    println!();
    println!("{}", "Queue:".bold());
    println!("  File: {}", ctx.queue.storage_location().display());
    println!(
        "  Pending operations: {}",
        if pending.is_empty() {
            "0".green()
        } else {
            pending.len().to_string().yellow()
        }
    );
    for op in pending.iter().take(MAX_PENDING_TO_DISPLAY) {
        println!("    {}", op.summary());
    }
    if pending.len() > MAX_PENDING_TO_DISPLAY {
        println!("    ... and {} more", pending.len() - MAX_PENDING_TO_DISPLAY);
    }

    println!();
    println!("{}", "Last sync:".bold());
    match history.last() {
        Some(record) => println!("  {}", record.summary()),
        None => println!("  {}", "Never".dimmed()),
    }

    Ok(())
}

/// List queued operations, optionally as the raw JSON array.
///
/// Reads the queue file only, so it works before `init` or without a remote.
pub fn handle_pending(json: bool, verbosity: VerbosityLevel) -> Result<()> {
    let storage = JsonFileStorage::open_default()?;
    let pending = storage.load().context("Failed to read the offline queue")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("{}", "No pending operations.".green());
        return Ok(());
    }

    for (idx, op) in pending.iter().enumerate() {
        println!("{} {}", format!("{}.", idx + 1).bold(), op.summary());
        if verbosity == VerbosityLevel::Verbose {
            println!("   {}", op.payload.to_string().dimmed());
        }
    }
    Ok(())
}

/// Poll the remote and replay automatically whenever it comes back.
///
/// Runs until interrupted, or for `polls` probes when given.
pub fn handle_watch(
    interval_secs: Option<u64>,
    polls: Option<u64>,
    verbosity: VerbosityLevel,
) -> Result<()> {
    let ctx = SyncContext::open(verbosity, false)?;
    let interval = match interval_secs {
        Some(secs) => std::time::Duration::from_secs(secs.max(1)),
        None => ctx.settings.watch_interval(),
    };

    let subscription = ctx.queue.attach();

    if verbosity != VerbosityLevel::Quiet {
        println!(
            "{} {} every {}s ({} pending)",
            "Watching".bold(),
            ctx.store.base_url().cyan(),
            interval.as_secs(),
            ctx.queue.pending_count()
        );
    }

    // the listener only fires on transitions; flush anything left from an earlier session
    if ctx.queue.is_online() {
        print_outcome(&ctx.queue.replay(SyncTrigger::Reconnect)?, verbosity);
    }

    let mut remaining = polls;
    loop {
        if let Some(n) = remaining.as_mut() {
            if *n == 0 {
                break;
            }
            *n -= 1;
        }
        thread::sleep(interval);
        let state = ctx.refresh_connectivity();
        log::debug!(
            "Probe: {} ({} pending)",
            state.as_str(),
            ctx.queue.pending_count()
        );
    }

    ctx.queue.detach(subscription);
    Ok(())
}
