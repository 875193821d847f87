//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::config::{PipelineConfig, Settings};
use crate::models::EnqueueReport;
use crate::repository::{DbContext, DeleteOutcome};
use crate::scrapers::{ContentExtractor, HttpExtractor};

/// Open the database, or explain how to create it.
pub async fn open_context(settings: &Settings) -> anyhow::Result<DbContext> {
    if !settings.database_exists() {
        anyhow::bail!(
            "No database at {}. Run 'mediatrack init' first.",
            settings.database_path().display()
        );
    }
    Ok(settings.open_db_context().await?)
}

/// Build the HTTP extractor for the configured keywords.
pub fn build_extractor(
    settings: &Settings,
    pipeline: &PipelineConfig,
) -> anyhow::Result<Arc<dyn ContentExtractor>> {
    let extractor = HttpExtractor::new(settings, pipeline.content_keywords.clone())?;
    Ok(Arc::new(extractor))
}

/// Print the accepted / duplicate / blocked breakdown of an enqueue.
pub fn print_enqueue_report(report: &EnqueueReport) {
    println!(
        "{} Queued {} of {} URLs in batch '{}'",
        style("✓").green(),
        report.accepted,
        report.total_input,
        report.batch_name
    );
    if report.skipped_duplicate > 0 {
        println!(
            "  {} {} already stored or queued",
            style("→").dim(),
            report.skipped_duplicate
        );
    }
    if report.skipped_blocked > 0 {
        println!(
            "  {} {} from blocked domains",
            style("→").dim(),
            report.skipped_blocked
        );
    }
    if report.invalid > 0 {
        println!("  {} {} invalid URLs", style("!").yellow(), report.invalid);
    }
    for (url, reason) in &report.failed {
        println!("  {} {}: {}", style("✗").red(), truncate(url, 60), reason);
    }
}

/// Print the result of a delete request.
pub fn print_delete_outcome(outcome: &DeleteOutcome) {
    println!(
        "{} Deleted {} of {} matching articles",
        style("✓").green(),
        outcome.deleted,
        outcome.requested
    );
    if outcome.buffered > 0 {
        println!(
            "  {} {} still in the write buffer; retry later",
            style("!").yellow(),
            outcome.buffered
        );
    }
}

/// Truncate a string for single-line display.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
