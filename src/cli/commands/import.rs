//! Queue admission commands: add, import, check.

use std::path::Path;

use console::style;

use crate::cli::helpers::{open_context, print_enqueue_report};
use crate::config::{PipelineConfig, Settings};
use crate::models::Candidate;
use crate::services::{check_existing, parse_batch};

/// Enqueue URLs given on the command line.
pub async fn cmd_add(
    settings: &Settings,
    pipeline: &PipelineConfig,
    urls: Vec<String>,
    batch: Option<&str>,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let candidates = urls.into_iter().map(Candidate::from).collect();
    let report = ctx
        .queue()
        .enqueue(candidates, batch, &pipeline.blocked_domains)
        .await?;
    print_enqueue_report(&report);
    Ok(())
}

/// Enqueue every valid row of a batch file.
pub async fn cmd_import(
    settings: &Settings,
    pipeline: &PipelineConfig,
    file: &Path,
    batch: Option<&str>,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let parsed = parse_batch(&text);

    for error in &parsed.errors {
        println!("  {} {}", style("✗").red(), error);
    }
    if parsed.candidates.is_empty() {
        println!("{} No valid rows in {}", style("!").yellow(), file.display());
        return Ok(());
    }

    let ctx = open_context(settings).await?;
    let report = ctx
        .queue()
        .enqueue(parsed.candidates, batch, &pipeline.blocked_domains)
        .await?;
    print_enqueue_report(&report);
    if !parsed.errors.is_empty() {
        println!(
            "  {} {} rows rejected",
            style("!").yellow(),
            parsed.errors.len()
        );
    }
    Ok(())
}

/// Print which inputs are already stored.
pub async fn cmd_check(settings: &Settings, urls: &[String]) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let report = check_existing(&ctx.articles(), urls, settings.dedup_batch_size).await;

    for url in urls {
        let marker = if report.existing.contains(url) {
            style(format!("{:<8}", "stored")).green()
        } else if report.unknown.contains(url) {
            style(format!("{:<8}", "unknown")).yellow()
        } else {
            style(format!("{:<8}", "new")).cyan()
        };
        println!("  {} {}", marker, url);
    }

    for error in &report.errors {
        println!("{} Dedup query failed: {}", style("!").yellow(), error);
    }
    println!(
        "{} {} of {} URLs already stored",
        style("→").cyan(),
        report.existing.len(),
        urls.len()
    );
    Ok(())
}
