//! History command handlers

use anyhow::{Context, Result};
use colored::Colorize;

use crate::history::{SyncHistory, SyncTrigger};

/// Handle history list command
pub fn handle_history_list(limit: usize) -> Result<()> {
    let history = SyncHistory::load().context("Failed to load sync history")?;

    if history.is_empty() {
        println!("{}", "No syncs in history.".yellow());
        return Ok(());
    }

    println!("{}", "Sync History".cyan().bold());
    println!("{}", "=".repeat(60).cyan());

    let records = history.list();
    let display_count = records.len().min(limit);

    for (idx, record) in records.iter().take(display_count).enumerate() {
        let trigger = match record.trigger {
            SyncTrigger::Manual => "MANUAL".blue(),
            SyncTrigger::Reconnect => "RECONNECT".green(),
        };

        println!("\n{} {}", format!("{}.", idx + 1).bold(), trigger.bold());
        println!(
            "   {} {}",
            "Time:".dimmed(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!(
            "   {} {}/{}",
            "Flushed:".dimmed(),
            record.flushed,
            record.attempted
        );
        if !record.failed_ids.is_empty() {
            println!(
                "   {} {}",
                "Retained:".dimmed(),
                record.failed_ids.join(", ").yellow()
            );
        }
    }

    if records.len() > display_count {
        println!(
            "\n{} Showing {} of {} syncs",
            "Note:".yellow(),
            display_count,
            records.len()
        );
    }

    Ok(())
}

/// Handle history clear command
pub fn handle_history_clear() -> Result<()> {
    let mut history = SyncHistory::load().context("Failed to load sync history")?;
    let count = history.len();
    history.clear().context("Failed to clear sync history")?;

    println!("{} Cleared {} sync record(s)", "✓".green(), count);
    Ok(())
}
