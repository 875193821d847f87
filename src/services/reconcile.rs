//! Duplicate reconciliation.
//!
//! Collapses rows sharing a normalized URL down to the most complete one.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::error::StoreError;
use crate::models::Article;
use crate::repository::{DbContext, DeleteOutcome};

/// Counts from one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Normalized URLs with more than one row.
    pub duplicate_groups: usize,
    /// Rows retained as the survivor of their group.
    pub kept: usize,
    pub deleted: usize,
    /// Rows too recently written to touch on this pass.
    pub deferred: usize,
    /// Delete batches that failed after retries.
    pub errors: Vec<String>,
}

/// Options for [`reconcile`].
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Rows written more recently than this are neither ranked nor deleted.
    pub recency_window: Duration,
    /// Row keys per delete statement.
    pub batch_size: usize,
    /// Report what would be deleted without deleting.
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            recency_window: Duration::from_secs(90 * 60),
            batch_size: 100,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Order survivors first: most filled fields, then most recently written.
fn rank(a: &Article, b: &Article) -> std::cmp::Ordering {
    b.filled_field_count()
        .cmp(&a.filled_field_count())
        .then_with(|| b.last_written().cmp(&a.last_written()))
        .then_with(|| b.row_key.cmp(&a.row_key))
}

/// Newest write time a row may have to be ranked. Windows reaching past
/// the epoch defer every row.
fn recency_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(window).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Sweep the store for duplicate normalized URLs.
pub async fn reconcile(ctx: &DbContext, options: ReconcileOptions) -> Result<ReconcileReport, StoreError> {
    let articles = ctx.articles();
    let cutoff = recency_cutoff(Utc::now(), options.recency_window);

    let mut groups: HashMap<String, Vec<Article>> = HashMap::new();
    for article in articles.get_all().await? {
        groups
            .entry(article.normalized_url.clone())
            .or_default()
            .push(article);
    }

    let mut report = ReconcileReport::default();
    let mut doomed: Vec<i64> = Vec::new();

    for (normalized_url, rows) in groups {
        if rows.len() < 2 {
            continue;
        }
        report.duplicate_groups += 1;

        let (mut settled, recent): (Vec<Article>, Vec<Article>) =
            rows.into_iter().partition(|a| a.last_written() <= cutoff);
        report.deferred += recent.len();

        if settled.is_empty() {
            continue;
        }
        settled.sort_by(rank);
        report.kept += 1;
        debug!(
            url = %normalized_url,
            keep = settled[0].row_key,
            remove = settled.len() - 1,
            deferred = recent.len(),
            "Duplicate group"
        );
        doomed.extend(settled.iter().skip(1).map(|a| a.row_key));
    }

    if options.dry_run {
        report.deleted = doomed.len();
        return Ok(report);
    }

    let mut deletes = DeleteOutcome::default();
    for chunk in doomed.chunks(options.batch_size.max(1)) {
        let outcome = options
            .retry
            .run("reconcile delete", || articles.delete_by_row_keys(chunk))
            .await;
        match outcome {
            Ok(outcome) => deletes.merge(outcome),
            Err(e) => {
                warn!("Failed to delete {} duplicate rows: {}", chunk.len(), e);
                report.errors.push(e.to_string());
            }
        }
    }
    report.deleted = deletes.deleted;
    report.deferred += deletes.buffered;

    info!(
        groups = report.duplicate_groups,
        kept = report.kept,
        deleted = report.deleted,
        deferred = report.deferred,
        "Reconciliation finished"
    );
    Ok(report)
}
