//! Content backfill: full-scrape stored articles that have no body text.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ExtractError, StoreError};
use crate::repository::DbContext;
use crate::scrapers::{ContentExtractor, ExtractMode};

/// Counts from one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scraped: usize,
    pub failed: usize,
    /// Rows inside the write buffer; picked up by a later run.
    pub buffered: usize,
}

/// Full-scrape up to `limit` rows with empty content and store the result.
///
/// Extraction failures are recorded on the row and do not stop the run.
pub async fn backfill_content(
    ctx: &DbContext,
    extractor: Arc<dyn ContentExtractor>,
    limit: i64,
    timeout: Duration,
) -> Result<BackfillReport, StoreError> {
    let articles = ctx.articles();
    let pending = articles.get_missing_content(limit).await?;
    info!("Backfilling content for {} articles", pending.len());

    let mut report = BackfillReport::default();
    for article in pending {
        let extracted = match tokio::time::timeout(timeout, extractor.extract(&article.url, ExtractMode::Full)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout(timeout)),
        };

        let stored = match extracted {
            Ok(extracted) => articles
                .record_scrape_success(
                    article.row_key,
                    &extracted.content,
                    &extracted.title,
                    extracted.publish_date,
                )
                .await
                .map(|_| true),
            Err(e) => {
                warn!("Backfill extraction failed for {}: {}", article.url, e);
                articles
                    .record_scrape_failure(article.row_key, &e.to_string())
                    .await
                    .map(|_| false)
            }
        };

        match stored {
            Ok(true) => report.scraped += 1,
            Ok(false) => report.failed += 1,
            Err(StoreError::WriteBuffered { .. }) => report.buffered += 1,
            Err(e) => {
                warn!("Failed to store backfill result for {}: {}", article.url, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
