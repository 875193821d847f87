//! Extraction commands: ingest, process, backfill.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::cli::helpers::{build_extractor, open_context, truncate};
use crate::config::{PipelineConfig, Settings};
use crate::models::BatchHints;
use crate::scrapers::ExtractMode;
use crate::services::{backfill_content, EnrichmentService, IngestEvent, IngestOutcome, IngestService};

/// Extract and store one URL without going through the queue.
pub async fn cmd_ingest(
    settings: &Settings,
    pipeline: PipelineConfig,
    url: &str,
    mode: ExtractMode,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let extractor = build_extractor(settings, &pipeline)?;
    let service = IngestService::new(ctx, extractor, pipeline, settings);

    match service.ingest_url(url, &BatchHints::default(), mode).await {
        IngestOutcome::Inserted { id, article } => {
            println!("{} Stored article {} ({})", style("✓").green(), id, mode);
            if !article.title.is_empty() {
                println!("  {} {}", style("Title:").bold(), article.title);
            }
            if let Some(date) = article.publish_date {
                println!("  {} {}", style("Published:").bold(), date.format("%Y-%m-%d"));
            }
            if !article.content.is_empty() {
                println!("  {} {}", style("Text:").bold(), truncate(&article.content, 200));
            }
        }
        IngestOutcome::Duplicate => {
            println!("{} Already stored: {}", style("→").dim(), url);
        }
        IngestOutcome::Failed(error) => {
            println!("{} Failed to ingest {}: {}", style("✗").red(), url, error);
        }
    }
    Ok(())
}

/// Drain the queue with a worker pool.
pub async fn cmd_process(
    settings: &Settings,
    pipeline: PipelineConfig,
    workers: usize,
    limit: Option<usize>,
    mode: ExtractMode,
    enrich: bool,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let pending = ctx.queue().pending_count().await?;

    if pending == 0 {
        println!("{} No pending queue entries", style("!").yellow());
        println!(
            "  {} Run 'mediatrack add' or 'mediatrack import' to queue URLs",
            style("→").dim()
        );
        return Ok(());
    }

    let total = limit.map_or(pending, |l| (l as u64).min(pending));
    println!(
        "{} Starting {} workers ({} pending entries, {} mode)",
        style("→").cyan(),
        workers,
        pending,
        mode
    );

    let extractor = build_extractor(settings, &pipeline)?;
    let service = IngestService::new(ctx.clone(), extractor, pipeline.clone(), settings);
    let enrichment = EnrichmentService::new(ctx.clone(), pipeline);
    let background = enrich.then(|| enrichment.clone().spawn_background());

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")?
            .progress_chars("#>-"),
    );

    // Event channel for progress updates
    let (event_tx, mut event_rx) = mpsc::channel::<IngestEvent>(100);

    let pb_events = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                IngestEvent::Started { url, .. } => {
                    pb_events.set_message(truncate(&url, 50));
                }
                IngestEvent::Completed { .. } | IngestEvent::Duplicate { .. } => {
                    pb_events.inc(1);
                }
                IngestEvent::Failed { url, error, .. } => {
                    pb_events.inc(1);
                    pb_events.println(format!(
                        "  {} {}: {}",
                        style("✗").red(),
                        truncate(&url, 60),
                        error
                    ));
                }
            }
        }
    });

    let result = service.run(workers, limit, mode, event_tx).await;

    // Wait for event handler to finish
    let _ = event_handler.await;
    pb.finish_and_clear();
    if let Some(handle) = background {
        handle.abort();
    }
    let report = result?;

    println!(
        "{} Processed {} entries: {} stored, {} duplicate, {} failed",
        style("✓").green(),
        report.completed + report.skipped_duplicate + report.failed,
        report.completed,
        report.skipped_duplicate,
        report.failed
    );
    if report.remaining > 0 {
        println!(
            "  {} {} entries still pending",
            style("!").yellow(),
            report.remaining
        );
    }
    if report.unrecorded > 0 {
        println!(
            "  {} {} entries could not be marked done and are stuck in processing",
            style("✗").red(),
            report.unrecorded
        );
    }

    if enrich && report.completed > 0 {
        let enrichment_report = enrichment.run_full_enrichment().await;
        if enrichment_report.is_success() {
            println!(
                "  {} Enrichment updated {} fields",
                style("→").dim(),
                enrichment_report.total_changed()
            );
        } else {
            println!(
                "  {} Enrichment incomplete; run 'mediatrack enrich' to retry",
                style("!").yellow()
            );
        }
    }

    Ok(())
}

/// Full-scrape stored articles that have no content yet.
pub async fn cmd_backfill(
    settings: &Settings,
    pipeline: &PipelineConfig,
    limit: i64,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let extractor = build_extractor(settings, pipeline)?;
    let report = backfill_content(&ctx, extractor, limit, settings.full_timeout).await?;

    println!(
        "{} Backfilled content for {} articles",
        style("✓").green(),
        report.scraped
    );
    if report.failed > 0 {
        println!("  {} {} failed", style("✗").red(), report.failed);
    }
    if report.buffered > 0 {
        println!(
            "  {} {} still in the write buffer; retry later",
            style("!").yellow(),
            report.buffered
        );
    }
    Ok(())
}
