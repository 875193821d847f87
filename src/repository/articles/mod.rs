//! Article record repository.
//!
//! Split into submodules:
//! - `mod.rs` (this file): Main struct, outcome types, lookups
//! - `write.rs`: Inserts and point updates
//! - `delete.rs`: Hard deletes with affected-row reporting
//! - `bulk.rs`: Bulk `UPDATE ... WHERE` passes used by enrichment
//!
//! The store emulates a write-buffer window: rows inserted less than
//! `write_buffer` ago reject point updates and deletes, and are skipped by
//! bulk passes.

mod bulk;
mod delete;
mod write;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use tokio::sync::Notify;

use super::diesel_models::ArticleRecord;
use super::format_datetime;
use super::pool::DbPool;
use crate::error::StoreError;
use crate::models::{Article, REQUIRED_FIELDS};
use crate::schema::articles;
use crate::with_conn;

pub use bulk::{FlagColumn, MatchUpdate, TermField};

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { id: i64, row_key: i64 },
    /// A row with the same normalized URL already exists.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Keys or ids the caller asked to delete.
    pub requested: usize,
    /// Rows actually removed.
    pub deleted: usize,
    /// Matching rows left alone because they are still in the write buffer.
    pub buffered: usize,
}

impl DeleteOutcome {
    pub fn merge(&mut self, other: DeleteOutcome) {
        self.requested += other.requested;
        self.deleted += other.deleted;
        self.buffered += other.buffered;
    }
}

/// Filled/missing counts for the required field set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub total: usize,
    pub filled: Vec<(&'static str, usize)>,
    pub complete: usize,
}

/// Repository for article records.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: DbPool,
    write_buffer: Duration,
    enrichment_signal: Option<Arc<Notify>>,
}

impl ArticleRepository {
    /// Create a new repository with no write-buffer window.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_buffer: Duration::ZERO,
            enrichment_signal: None,
        }
    }

    pub fn with_write_buffer(mut self, write_buffer: Duration) -> Self {
        self.write_buffer = write_buffer;
        self
    }

    /// Notify `signal` after each successful insert.
    pub fn with_enrichment_signal(mut self, signal: Arc<Notify>) -> Self {
        self.enrichment_signal = Some(signal);
        self
    }

    pub fn write_buffer(&self) -> Duration {
        self.write_buffer
    }

    /// Rows inserted at or before this timestamp are outside the write buffer.
    pub(crate) fn buffer_cutoff(&self, now: DateTime<Utc>) -> String {
        let window = chrono::Duration::from_std(self.write_buffer).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::UNIX_EPOCH);
        format_datetime(cutoff)
    }

    /// Which of the given normalized URLs already have a row.
    ///
    /// Issues a single `IN` query; callers are responsible for batching.
    pub async fn existing_normalized(
        &self,
        normalized: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if normalized.is_empty() {
            return Ok(HashSet::new());
        }
        with_conn!(self.pool, conn => {
            let found: Vec<String> = articles::table
                .filter(articles::normalized_url.eq_any(normalized))
                .select(articles::normalized_url)
                .distinct()
                .load(&mut conn)
                .await?;
            Ok(found.into_iter().collect())
        })
    }

    /// Whether any row has this normalized URL.
    pub async fn exists(&self, normalized_url: &str) -> Result<bool, StoreError> {
        with_conn!(self.pool, conn => {
            let count: i64 = articles::table
                .filter(articles::normalized_url.eq(normalized_url))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    /// Get an article by its numeric id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>, StoreError> {
        with_conn!(self.pool, conn => {
            let record = articles::table
                .filter(articles::id.eq(id))
                .order(articles::row_key.asc())
                .select(ArticleRecord::as_select())
                .first::<ArticleRecord>(&mut conn)
                .await
                .optional()?;
            Ok(record.map(Article::from))
        })
    }

    /// All rows stored under a normalized URL, oldest first.
    pub async fn get_by_normalized_url(
        &self,
        normalized_url: &str,
    ) -> Result<Vec<Article>, StoreError> {
        with_conn!(self.pool, conn => {
            let records = articles::table
                .filter(articles::normalized_url.eq(normalized_url))
                .order(articles::row_key.asc())
                .select(ArticleRecord::as_select())
                .load::<ArticleRecord>(&mut conn)
                .await?;
            Ok(records.into_iter().map(Article::from).collect())
        })
    }

    /// Every article, in storage order.
    pub async fn get_all(&self) -> Result<Vec<Article>, StoreError> {
        with_conn!(self.pool, conn => {
            let records = articles::table
                .order(articles::row_key.asc())
                .select(ArticleRecord::as_select())
                .load::<ArticleRecord>(&mut conn)
                .await?;
            Ok(records.into_iter().map(Article::from).collect())
        })
    }

    /// Raw rows including storage NULLs, in storage order.
    pub async fn get_all_raw(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        with_conn!(self.pool, conn => {
            articles::table
                .order(articles::row_key.asc())
                .select(ArticleRecord::as_select())
                .load::<ArticleRecord>(&mut conn)
                .await
                .map_err(StoreError::from)
        })
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        with_conn!(self.pool, conn => {
            articles::table
                .count()
                .get_result(&mut conn)
                .await
                .map_err(StoreError::from)
        })
    }

    /// Mutable articles with no body text, oldest first.
    pub async fn get_missing_content(&self, limit: i64) -> Result<Vec<Article>, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        with_conn!(self.pool, conn => {
            let records = articles::table
                .filter(articles::content.eq(""))
                .filter(articles::inserted_at.le(&cutoff))
                .order(articles::row_key.asc())
                .limit(limit)
                .select(ArticleRecord::as_select())
                .load::<ArticleRecord>(&mut conn)
                .await?;
            Ok(records.into_iter().map(Article::from).collect())
        })
    }

    /// Articles missing at least one required field.
    pub async fn get_incomplete(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|article| !article.meets_completeness())
            .take(limit)
            .collect())
    }

    /// Count filled values per required field across all rows.
    pub async fn completeness_report(&self) -> Result<CompletenessReport, StoreError> {
        let all = self.get_all().await?;
        let filled = REQUIRED_FIELDS
            .iter()
            .map(|field| {
                let count = all
                    .iter()
                    .filter(|a| !a.missing_required_fields().contains(field))
                    .count();
                (*field, count)
            })
            .collect();

        Ok(CompletenessReport {
            total: all.len(),
            filled,
            complete: all.iter().filter(|a| a.meets_completeness()).count(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use crate::repository::diesel_models::NewArticleRecord;
    use crate::repository::{format_datetime, DbContext};
    use crate::schema::articles;
    use crate::utils::normalize_url;

    pub async fn test_context() -> (tempfile::TempDir, DbContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::open(&dir.path().join("test.db"), std::time::Duration::ZERO)
            .await
            .unwrap();
        (dir, ctx)
    }

    /// Run raw SQL against a test database, e.g. to install failure triggers.
    pub async fn execute_sql(ctx: &DbContext, sql: &str) {
        use diesel_async::SimpleAsyncConnection;

        let mut conn = ctx.pool().get().await.unwrap();
        conn.batch_execute(sql).await.unwrap();
    }

    /// Append a row directly, bypassing the duplicate check and id assignment.
    pub async fn insert_raw(
        ctx: &DbContext,
        url: &str,
        written_at: DateTime<Utc>,
        fill: impl FnOnce(&mut NewArticleRecord),
    ) -> i64 {
        let mut record = NewArticleRecord::with_defaults(url, &normalize_url(url), written_at);
        record.updated_at = format_datetime(written_at);
        fill(&mut record);
        let mut conn = ctx.pool().get().await.unwrap();
        diesel::insert_into(articles::table)
            .values(&record)
            .execute(&mut conn)
            .await
            .unwrap();
        articles::table
            .select(diesel::dsl::max(articles::row_key))
            .first::<Option<i64>>(&mut conn)
            .await
            .unwrap()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use crate::models::NewArticle;

    #[tokio::test]
    async fn test_existing_normalized() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles();
        repo.insert(&NewArticle::new("https://a.com/1")).await.unwrap();

        let found = repo
            .existing_normalized(&["https://a.com/1".into(), "https://a.com/2".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains("https://a.com/1"));
        assert!(repo.existing_normalized(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completeness_report_counts_fields() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles();
        let mut article = NewArticle::new("https://a.com/1");
        article.title = "Title".into();
        repo.insert(&article).await.unwrap();
        repo.insert(&NewArticle::new("https://a.com/2")).await.unwrap();

        let report = repo.completeness_report().await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.complete, 0);
        let title = report.filled.iter().find(|(f, _)| *f == "title").unwrap();
        assert_eq!(title.1, 1);
        let id = report.filled.iter().find(|(f, _)| *f == "id").unwrap();
        assert_eq!(id.1, 2);

        assert_eq!(repo.get_incomplete(10).await.unwrap().len(), 2);
        assert_eq!(repo.get_incomplete(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_respects_buffer() {
        let (_dir, ctx) = test_context().await;
        ctx.articles()
            .insert(&NewArticle::new("https://a.com/1"))
            .await
            .unwrap();

        assert_eq!(ctx.articles().get_missing_content(10).await.unwrap().len(), 1);

        let buffered = ctx
            .articles()
            .with_write_buffer(std::time::Duration::from_secs(3600));
        assert!(buffered.get_missing_content(10).await.unwrap().is_empty());
    }
}
