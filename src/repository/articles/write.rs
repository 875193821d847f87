//! Inserts and point updates.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, warn};

use super::{ArticleRepository, InsertOutcome};
use crate::error::StoreError;
use crate::models::{ArticlePatch, NewArticle};
use crate::repository::diesel_models::{ArticleChangeset, NewArticleRecord};
use crate::repository::format_datetime;
use crate::repository::pool::SqliteConn;
use crate::schema::{articles, id_sequences};
use crate::utils::{extract_domain, normalize_url, truncate_chars};
use crate::with_conn;

const ARTICLE_SEQUENCE: &str = "articles";

/// Bound on stored scrape error messages.
const MAX_SCRAPE_ERROR_LEN: usize = 500;

impl ArticleRepository {
    /// Insert a new article unless its normalized URL is already stored.
    ///
    /// The id is the next value after both the highest stored id and the
    /// highest id ever assigned, so ids of deleted rows are not reused.
    /// Check, id assignment, and insert run under one write lock.
    pub async fn insert(&self, article: &NewArticle) -> Result<InsertOutcome, StoreError> {
        let normalized = normalize_url(&article.url);
        if normalized.is_empty() {
            return Err(StoreError::InvalidField("url is empty".to_string()));
        }

        let record = build_record(article, &normalized, Utc::now());
        let mut conn = self.pool.get().await?;

        conn.batch_execute("BEGIN IMMEDIATE").await?;
        let result = insert_locked(&mut conn, record).await;
        let outcome = match result {
            Ok(outcome) => {
                conn.batch_execute("COMMIT").await?;
                outcome
            }
            Err(e) => {
                if let Err(rollback) = conn.batch_execute("ROLLBACK").await {
                    warn!("Rollback after failed insert also failed: {}", rollback);
                }
                return Err(e);
            }
        };

        match outcome {
            InsertOutcome::Inserted { id, .. } => {
                debug!(id, url = %normalized, "Inserted article");
                if let Some(signal) = &self.enrichment_signal {
                    signal.notify_one();
                }
            }
            InsertOutcome::Duplicate => {
                debug!(url = %normalized, "Declined duplicate article");
            }
        }
        Ok(outcome)
    }

    /// Apply a partial update to the article with this id.
    ///
    /// Values that would blank a field are dropped first. Returns the number
    /// of rows changed; fails with [`StoreError::WriteBuffered`] if the row is
    /// still inside the write-buffer window.
    pub async fn update_fields(&self, id: i64, patch: ArticlePatch) -> Result<usize, StoreError> {
        let patch = patch.without_regressions();
        if patch.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let cutoff = self.buffer_cutoff(now);
        let changes = ArticleChangeset::from_patch(patch, now);

        with_conn!(self.pool, conn => {
            let rows: Vec<(i64, String)> = articles::table
                .filter(articles::id.eq(id))
                .select((articles::row_key, articles::inserted_at))
                .load(&mut conn)
                .await?;
            if let Some((row_key, _)) = rows.iter().find(|(_, inserted)| *inserted > cutoff) {
                return Err(StoreError::WriteBuffered { row: *row_key });
            }

            let updated = diesel::update(articles::table.filter(articles::id.eq(id)))
                .set(&changes)
                .execute(&mut conn)
                .await?;
            Ok(updated)
        })
    }

    /// Store freshly scraped body text for a row.
    ///
    /// Title and publish date are only filled when still unset.
    pub async fn record_scrape_success(
        &self,
        row_key: i64,
        content: &str,
        title: &str,
        publish_date: Option<DateTime<Utc>>,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let cutoff = self.buffer_cutoff(now);
        let now_str = format_datetime(now);
        let epoch = format_datetime(DateTime::UNIX_EPOCH);

        with_conn!(self.pool, conn => {
            self.ensure_mutable(&mut conn, row_key, &cutoff).await?;

            let updated = diesel::update(articles::table.filter(articles::row_key.eq(row_key)))
                .set((
                    articles::content.eq(content),
                    articles::text_scraped.eq(Some(true)),
                    articles::text_scraped_at.eq(Some(now_str.clone())),
                    articles::text_scrape_error.eq(Some(String::new())),
                    articles::updated_at.eq(&now_str),
                ))
                .execute(&mut conn)
                .await?;

            if !title.is_empty() {
                diesel::update(
                    articles::table
                        .filter(articles::row_key.eq(row_key))
                        .filter(articles::title.eq("")),
                )
                .set(articles::title.eq(title))
                .execute(&mut conn)
                .await?;
            }

            if let Some(date) = publish_date {
                diesel::update(
                    articles::table.filter(articles::row_key.eq(row_key)).filter(
                        articles::publish_date
                            .is_null()
                            .or(articles::publish_date.eq(&epoch)),
                    ),
                )
                .set(articles::publish_date.eq(Some(format_datetime(date))))
                .execute(&mut conn)
                .await?;
            }
            Ok(updated)
        })
    }

    /// Record a failed scrape attempt without touching content.
    pub async fn record_scrape_failure(&self, row_key: i64, error: &str) -> Result<usize, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());
        let message = truncate_chars(error, MAX_SCRAPE_ERROR_LEN);

        with_conn!(self.pool, conn => {
            self.ensure_mutable(&mut conn, row_key, &cutoff).await?;
            diesel::update(articles::table.filter(articles::row_key.eq(row_key)))
                .set(articles::text_scrape_error.eq(Some(message)))
                .execute(&mut conn)
                .await
                .map_err(StoreError::from)
        })
    }

    async fn ensure_mutable(
        &self,
        conn: &mut SqliteConn,
        row_key: i64,
        cutoff: &str,
    ) -> Result<(), StoreError> {
        let inserted: Option<String> = articles::table
            .filter(articles::row_key.eq(row_key))
            .select(articles::inserted_at)
            .first(conn)
            .await
            .optional()?;
        match inserted {
            Some(inserted) if inserted.as_str() > cutoff => {
                Err(StoreError::WriteBuffered { row: row_key })
            }
            _ => Ok(()),
        }
    }
}

fn build_record(article: &NewArticle, normalized: &str, now: DateTime<Utc>) -> NewArticleRecord {
    let mut record = NewArticleRecord::with_defaults(article.url.trim(), normalized, now);
    record.domain = if article.domain.is_empty() {
        extract_domain(normalized)
    } else {
        article.domain.trim().to_lowercase()
    };
    record.title = article.title.trim().to_string();
    record.content = article.content.clone();
    if let Some(date) = article.publish_date {
        record.publish_date = Some(format_datetime(date));
    }
    record.page_rank = Some(article.page_rank);
    record.social_shares_count = Some(article.social_shares_count);
    record.matched_portcos = Some(article.matched_portcos.clone());
    record.tagged_antler = Some(article.tagged_antler);
    record.data_ingestion = Some(article.data_ingestion);
    record.text_scraped = Some(article.text_scraped);
    if article.text_scraped {
        record.text_scraped_at = Some(format_datetime(now));
    }
    record
}

async fn insert_locked(
    conn: &mut SqliteConn,
    mut record: NewArticleRecord,
) -> Result<InsertOutcome, StoreError> {
    let existing: i64 = articles::table
        .filter(articles::normalized_url.eq(&record.normalized_url))
        .count()
        .get_result(conn)
        .await?;
    if existing > 0 {
        return Ok(InsertOutcome::Duplicate);
    }

    let max_id: Option<i64> = articles::table
        .select(diesel::dsl::max(articles::id))
        .first(conn)
        .await?;
    let last_assigned: Option<i64> = id_sequences::table
        .filter(id_sequences::name.eq(ARTICLE_SEQUENCE))
        .select(id_sequences::last_id)
        .first(conn)
        .await
        .optional()?;
    let id = max_id.unwrap_or(0).max(last_assigned.unwrap_or(0)) + 1;

    diesel::replace_into(id_sequences::table)
        .values((
            id_sequences::name.eq(ARTICLE_SEQUENCE),
            id_sequences::last_id.eq(id),
        ))
        .execute(conn)
        .await?;

    record.id = Some(id);
    diesel::insert_into(articles::table)
        .values(&record)
        .execute(conn)
        .await?;

    let row_key: i64 = articles::table
        .filter(articles::id.eq(id))
        .select(articles::row_key)
        .order(articles::row_key.desc())
        .first(conn)
        .await?;

    Ok(InsertOutcome::Inserted { id, row_key })
}
