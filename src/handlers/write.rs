//! Insert, update, and delete commands.

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use crate::queue::{OperationKind, WriteOutcome};
use crate::VerbosityLevel;

use super::context::SyncContext;

/// Parse the JSON payload given on the command line
pub fn parse_payload(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Payload is not valid JSON")?;
    if !value.is_object() && !value.is_array() {
        anyhow::bail!("Payload must be a JSON object or array, got: {value}");
    }
    Ok(value)
}

/// Execute one write through the offline queue
pub fn handle_write(
    kind: OperationKind,
    table: &str,
    payload: &str,
    offline: bool,
    verbosity: VerbosityLevel,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let ctx = SyncContext::open(verbosity, offline)?;

    let outcome = ctx
        .queue
        .execute_operation(kind, table, payload)
        .with_context(|| format!("Failed to {kind} on '{table}'"))?;

    match &outcome {
        WriteOutcome::Confirmed(rows) => {
            if verbosity != VerbosityLevel::Quiet {
                println!(
                    "{} {} on {} applied ({} row{})",
                    "✓".green(),
                    kind.as_str().bold(),
                    table.cyan(),
                    rows.len(),
                    if rows.len() == 1 { "" } else { "s" }
                );
            }
        }
        WriteOutcome::QueuedLocally(op) => {
            if verbosity != VerbosityLevel::Quiet {
                println!("  {} {}", "Queued as".dimmed(), op.id);
                println!(
                    "  {} {}",
                    "Pending:".dimmed(),
                    ctx.queue.pending_count().to_string().yellow()
                );
            }
        }
    }

    if verbosity == VerbosityLevel::Verbose {
        for row in outcome.rows() {
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
    }

    Ok(())
}
