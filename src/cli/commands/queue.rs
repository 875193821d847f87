//! Queue maintenance commands.

use console::style;

use crate::cli::helpers::{open_context, truncate};
use crate::config::Settings;
use crate::models::QueueStatus;

/// Show entry counts per status.
pub async fn cmd_status(settings: &Settings, batch: Option<&str>) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let counts = ctx.queue().status_summary(batch).await?;

    match batch {
        Some(name) => println!("\n{} '{}'", style("Queue batch").bold(), name),
        None => println!("\n{}", style("Queue").bold()),
    }
    println!("{}", "-".repeat(32));
    println!("{:<14} {:>10}", "Pending:", counts.pending);
    println!("{:<14} {:>10}", "Processing:", counts.processing);
    println!("{:<14} {:>10}", "Completed:", counts.completed);
    println!("{:<14} {:>10}", "Failed:", counts.failed);
    println!("{:<14} {:>10}", "Total:", counts.total());
    Ok(())
}

/// List entries with a given status.
pub async fn cmd_list(
    settings: &Settings,
    status: QueueStatus,
    batch: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let entries = ctx.queue().list_by_status(status, batch, limit).await?;

    if entries.is_empty() {
        println!("{} No {} entries", style("!").yellow(), status);
        return Ok(());
    }

    println!(
        "{:<20} {:<22} {:<6} {}",
        style("Created").bold(),
        style("Batch").bold(),
        style("Tries").bold(),
        style("URL").bold()
    );
    for entry in &entries {
        println!(
            "{:<20} {:<22} {:<6} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&entry.batch_name, 22),
            entry.retry_count,
            entry.url
        );
        if !entry.error_message.is_empty() {
            println!("  {} {}", style("✗").red(), truncate(&entry.error_message, 100));
        }
    }
    println!("\n{} {} entries", style("→").dim(), entries.len());
    Ok(())
}

/// Force every entry of a batch to completed.
pub async fn cmd_clear(settings: &Settings, batch: &str, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will mark every entry in batch '{}' completed.",
            style("!").yellow(),
            batch
        );
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let ctx = open_context(settings).await?;
    let cleared = ctx.queue().force_clear_batch(batch).await?;
    println!(
        "{} Marked {} entries in '{}' completed",
        style("✓").green(),
        cleared,
        batch
    );
    Ok(())
}

/// Return failed entries to pending.
pub async fn cmd_retry(settings: &Settings, batch: Option<&str>) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let requeued = ctx.queue().requeue_failed(batch).await?;
    println!(
        "{} Requeued {} failed entries",
        style("✓").green(),
        requeued
    );
    Ok(())
}

/// Delete a batch's entries outright.
pub async fn cmd_purge(settings: &Settings, batch: &str, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will delete every entry in batch '{}'.",
            style("!").yellow(),
            batch
        );
        println!("  Purged URLs are no longer seen by duplicate checks.");
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let ctx = open_context(settings).await?;
    let purged = ctx.queue().purge_batch(batch).await?;
    println!(
        "{} Purged {} entries from '{}'",
        style("✓").green(),
        purged,
        batch
    );
    Ok(())
}
