//! Record store inspection and corrective commands.

use console::style;

use crate::cli::helpers::{open_context, print_delete_outcome, truncate};
use crate::config::Settings;
use crate::error::StoreError;
use crate::models::ArticlePatch;
use crate::repository::InsertOutcome;
use crate::services::{insert_manual, ManualArticle, RetryPolicy};

/// Show filled counts for each required field.
pub async fn cmd_report(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let report = ctx.articles().completeness_report().await?;

    println!("\n{}", style("Completeness").bold());
    println!("{}", "-".repeat(40));
    for (field, filled) in &report.filled {
        let missing = report.total - filled;
        let marker = if missing == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        };
        println!(
            "{} {:<14} {:>8} filled {:>8} missing",
            marker, field, filled, missing
        );
    }
    println!("{}", "-".repeat(40));
    println!(
        "{} of {} articles complete",
        style(report.complete).cyan(),
        report.total
    );
    Ok(())
}

/// List articles missing required fields.
pub async fn cmd_incomplete(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let articles = ctx.articles().get_incomplete(limit).await?;

    if articles.is_empty() {
        println!("{} Every article is complete", style("✓").green());
        return Ok(());
    }

    for article in &articles {
        let id = article
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>6}  {}", style(id).cyan(), truncate(&article.url, 80));
        println!(
            "        {} {}",
            style("missing:").dim(),
            article.missing_required_fields().join(", ")
        );
    }
    Ok(())
}

/// Insert a hand-entered article.
pub async fn cmd_add(
    settings: &Settings,
    url: String,
    title: String,
    content: String,
    date: Option<String>,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let manual = ManualArticle {
        url: url.clone(),
        title,
        content,
        publish_date: date,
    };

    match insert_manual(&ctx, manual).await? {
        InsertOutcome::Inserted { id, .. } => {
            println!("{} Stored article {}", style("✓").green(), id)
        }
        InsertOutcome::Duplicate => {
            println!("{} Already stored: {}", style("→").dim(), url)
        }
    }
    Ok(())
}

/// Delete articles with no numeric id.
pub async fn cmd_purge_null_ids(settings: &Settings, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will delete every article without a numeric id.",
            style("!").yellow()
        );
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let ctx = open_context(settings).await?;
    let articles = ctx.articles();
    let outcome = RetryPolicy::default()
        .run("purge null ids", || articles.purge_null_ids())
        .await?;
    print_delete_outcome(&outcome);
    Ok(())
}

/// Delete articles by id or URL pattern.
pub async fn cmd_delete(
    settings: &Settings,
    ids: Vec<i64>,
    url_pattern: Option<&str>,
    confirm: bool,
) -> anyhow::Result<()> {
    if ids.is_empty() && url_pattern.is_none() {
        anyhow::bail!("Specify --id or --url-pattern");
    }
    if !confirm {
        match url_pattern {
            Some(pattern) => println!(
                "{} This will delete every article matching '{}'.",
                style("!").yellow(),
                pattern
            ),
            None => println!(
                "{} This will delete {} articles by id.",
                style("!").yellow(),
                ids.len()
            ),
        }
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let ctx = open_context(settings).await?;
    let articles = ctx.articles();
    let retry = RetryPolicy::default();
    let outcome = match url_pattern {
        Some(pattern) => {
            retry
                .run("delete by url pattern", || articles.delete_by_url_pattern(pattern))
                .await?
        }
        None => {
            retry
                .run("delete by id", || articles.delete_by_ids(&ids))
                .await?
        }
    };
    print_delete_outcome(&outcome);
    Ok(())
}

/// Apply `field=value` edits to one article.
pub async fn cmd_edit(settings: &Settings, id: i64, assignments: &[String]) -> anyhow::Result<()> {
    let mut patch = ArticlePatch::default();
    for assignment in assignments {
        let (field, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected field=value, got '{}'", assignment))?;
        patch.set(field.trim(), value.trim())?;
    }

    let ctx = open_context(settings).await?;
    match ctx.articles().update_fields(id, patch).await {
        Ok(0) => println!(
            "{} Nothing changed for article {} (missing, or edits would clear filled fields)",
            style("!").yellow(),
            id
        ),
        Ok(_) => println!("{} Updated article {}", style("✓").green(), id),
        Err(StoreError::WriteBuffered { .. }) => println!(
            "{} Article {} was written too recently to edit; retry later",
            style("!").yellow(),
            id
        ),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
