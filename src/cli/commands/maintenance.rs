//! Whole-table maintenance: enrichment and duplicate reconciliation.

use console::style;

use crate::cli::helpers::open_context;
use crate::config::{duration_from_minutes, PipelineConfig, Settings};
use crate::services::{reconcile, EnrichmentService, ReconcileOptions, RetryPolicy};

/// Run the full enrichment pass and print each step.
pub async fn cmd_enrich(settings: &Settings, pipeline: PipelineConfig) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let report = EnrichmentService::new(ctx, pipeline).run_full_enrichment().await;

    for step in &report.steps {
        match (&step.changed, &step.error) {
            (Some(changed), _) => {
                println!("  {} {:<14} {} rows", style("✓").green(), step.name, changed)
            }
            (None, Some(error)) => {
                println!("  {} {:<14} {}", style("✗").red(), step.name, error)
            }
            (None, None) => {}
        }
    }

    if report.is_success() {
        println!("{} Enrichment complete", style("✓").green());
    } else {
        println!(
            "{} {} steps failed; re-run to finish",
            style("!").yellow(),
            report.failed_steps().count()
        );
    }
    Ok(())
}

/// Collapse duplicate articles.
pub async fn cmd_reconcile(
    settings: &Settings,
    dry_run: bool,
    window_minutes: Option<u64>,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let options = ReconcileOptions {
        recency_window: window_minutes
            .map(duration_from_minutes)
            .unwrap_or(settings.recency_window),
        batch_size: settings.delete_batch_size,
        dry_run,
        retry: RetryPolicy::default(),
    };
    let report = reconcile(&ctx, options).await?;

    if report.duplicate_groups == 0 {
        println!("{} No duplicate articles", style("✓").green());
        return Ok(());
    }

    let verb = if dry_run { "Would delete" } else { "Deleted" };
    println!(
        "{} {} groups: kept {}, {} {}",
        style("✓").green(),
        report.duplicate_groups,
        report.kept,
        verb.to_lowercase(),
        report.deleted
    );
    if report.deferred > 0 {
        println!(
            "  {} {} recent rows deferred to a later run",
            style("→").dim(),
            report.deferred
        );
    }
    for error in &report.errors {
        println!("  {} {}", style("✗").red(), error);
    }
    Ok(())
}
