//! Processing queue repository.
//!
//! Entries move `pending → processing → {completed, failed}`. Claiming uses
//! a conditional update so a row is handed to exactly one worker.

use std::collections::HashSet;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{debug, info, warn};

use super::diesel_models::{NewQueueRecord, QueueRecord};
use super::format_datetime;
use super::pool::DbPool;
use crate::error::StoreError;
use crate::models::{BatchHints, Candidate, EnqueueReport, QueueEntry, QueueStatus, StatusCounts};
use crate::schema::{articles, processing_queue};
use crate::utils::{is_blocked, is_valid_url, normalize_url, truncate_chars};
use crate::with_conn;

/// Bound on stored failure messages.
pub const MAX_ERROR_LEN: usize = 500;

/// Claim attempts before giving up on a contended queue.
const MAX_CLAIM_ATTEMPTS: usize = 16;

/// Name used when a caller enqueues without naming the batch.
pub fn default_batch_name() -> String {
    format!("batch_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Repository for the processing queue.
#[derive(Clone)]
pub struct QueueRepository {
    pool: DbPool,
}

impl QueueRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Whether a normalized URL is already stored or has a queue entry in
    /// any status.
    pub async fn is_queue_or_store_member(&self, normalized_url: &str) -> Result<bool, StoreError> {
        with_conn!(self.pool, conn => {
            let queued: i64 = processing_queue::table
                .filter(processing_queue::url.eq(normalized_url))
                .count()
                .get_result(&mut conn)
                .await?;
            if queued > 0 {
                return Ok(true);
            }
            let stored: i64 = articles::table
                .filter(articles::normalized_url.eq(normalized_url))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(stored > 0)
        })
    }

    /// Admit candidates that are new to both the queue and the store.
    ///
    /// The input is de-duplicated against itself first. Membership is
    /// checked per candidate right before its insert; two concurrent calls
    /// for the same new URL can still both admit it. A storage error on one
    /// candidate is recorded in [`EnqueueReport::failed`] and the rest of
    /// the batch is still processed.
    pub async fn enqueue(
        &self,
        candidates: Vec<Candidate>,
        batch_name: Option<&str>,
        blocked_domains: &[String],
    ) -> Result<EnqueueReport, StoreError> {
        let batch_name = batch_name
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_batch_name);

        let mut report = EnqueueReport {
            batch_name: batch_name.clone(),
            total_input: candidates.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for candidate in candidates {
            if !is_valid_url(&candidate.url) {
                report.invalid += 1;
                continue;
            }
            let normalized = normalize_url(&candidate.url);
            if is_blocked(&normalized, blocked_domains) {
                report.skipped_blocked += 1;
                continue;
            }
            if !seen.insert(normalized.clone()) {
                report.skipped_duplicate += 1;
                continue;
            }
            match self.admit(&normalized, &batch_name, candidate.hints).await {
                Ok(true) => report.accepted += 1,
                Ok(false) => report.skipped_duplicate += 1,
                Err(e) => {
                    warn!(url = %normalized, error = %e, "Failed to enqueue URL");
                    report.failed.push((candidate.url, e.to_string()));
                }
            }
        }

        info!(
            batch = %report.batch_name,
            accepted = report.accepted,
            duplicates = report.skipped_duplicate,
            blocked = report.skipped_blocked,
            invalid = report.invalid,
            failed = report.failed.len(),
            "Enqueued batch"
        );
        Ok(report)
    }

    /// Insert one pending entry unless the URL is already queued or stored.
    ///
    /// Returns `false` for a known URL.
    async fn admit(
        &self,
        normalized: &str,
        batch_name: &str,
        hints: BatchHints,
    ) -> Result<bool, StoreError> {
        if self.is_queue_or_store_member(normalized).await? {
            return Ok(false);
        }

        let now = format_datetime(Utc::now());
        let record = NewQueueRecord {
            id: uuid::Uuid::new_v4().to_string(),
            url: normalized.to_string(),
            status: QueueStatus::Pending.as_str().to_string(),
            batch_name: batch_name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            error_message: String::new(),
            retry_count: 0,
            hint_title: hints.title,
            hint_publish_date: hints.publish_date,
            hint_brand: hints.brand,
        };
        with_conn!(self.pool, conn => {
            diesel::insert_into(processing_queue::table)
                .values(&record)
                .execute(&mut conn)
                .await?;
        });
        Ok(true)
    }

    /// Claim the oldest pending entry, marking it `processing`.
    ///
    /// Returns `None` when nothing is pending.
    pub async fn dequeue_next(&self) -> Result<Option<QueueEntry>, StoreError> {
        with_conn!(self.pool, conn => {
            for _ in 0..MAX_CLAIM_ATTEMPTS {
                let candidate: Option<QueueRecord> = processing_queue::table
                    .filter(processing_queue::status.eq(QueueStatus::Pending.as_str()))
                    .order((processing_queue::created_at.asc(), processing_queue::id.asc()))
                    .select(QueueRecord::as_select())
                    .first(&mut conn)
                    .await
                    .optional()?;

                let Some(record) = candidate else {
                    return Ok(None);
                };

                let now = format_datetime(Utc::now());
                let claimed = diesel::update(
                    processing_queue::table
                        .filter(processing_queue::id.eq(&record.id))
                        .filter(processing_queue::status.eq(QueueStatus::Pending.as_str())),
                )
                .set((
                    processing_queue::status.eq(QueueStatus::Processing.as_str()),
                    processing_queue::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

                if claimed == 1 {
                    let mut entry = QueueEntry::from(record);
                    entry.status = QueueStatus::Processing;
                    entry.updated_at = crate::repository::parse_datetime(&now);
                    debug!(id = %entry.id, url = %entry.url, "Claimed queue entry");
                    return Ok(Some(entry));
                }
                // Another worker won this row; look again.
            }
            Err(StoreError::Busy("queue claim kept losing to other workers".to_string()))
        })
    }

    /// Mark an entry completed. Repeating the call is harmless.
    pub async fn complete(&self, entry_id: &str) -> Result<bool, StoreError> {
        self.set_terminal(entry_id, QueueStatus::Completed, String::new())
            .await
    }

    /// Mark an entry failed with a bounded error message.
    pub async fn fail(&self, entry_id: &str, error_message: &str) -> Result<bool, StoreError> {
        let message = truncate_chars(error_message, MAX_ERROR_LEN);
        self.set_terminal(entry_id, QueueStatus::Failed, message)
            .await
    }

    async fn set_terminal(
        &self,
        entry_id: &str,
        status: QueueStatus,
        message: String,
    ) -> Result<bool, StoreError> {
        let now = format_datetime(Utc::now());
        with_conn!(self.pool, conn => {
            let updated = diesel::update(processing_queue::table.find(entry_id))
                .set((
                    processing_queue::status.eq(status.as_str()),
                    processing_queue::error_message.eq(&message),
                    processing_queue::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
            Ok(updated > 0)
        })
    }

    pub async fn get(&self, entry_id: &str) -> Result<Option<QueueEntry>, StoreError> {
        with_conn!(self.pool, conn => {
            let record = processing_queue::table
                .find(entry_id)
                .select(QueueRecord::as_select())
                .first::<QueueRecord>(&mut conn)
                .await
                .optional()?;
            Ok(record.map(QueueEntry::from))
        })
    }

    /// Entries in a status, oldest first, optionally limited to a batch.
    pub async fn list_by_status(
        &self,
        status: QueueStatus,
        batch_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        with_conn!(self.pool, conn => {
            let mut query = processing_queue::table
                .filter(processing_queue::status.eq(status.as_str()))
                .order(processing_queue::created_at.asc())
                .limit(limit)
                .select(QueueRecord::as_select())
                .into_boxed();
            if let Some(batch) = batch_name {
                query = query.filter(processing_queue::batch_name.eq(batch));
            }
            let records: Vec<QueueRecord> = query.load(&mut conn).await?;
            Ok(records.into_iter().map(QueueEntry::from).collect())
        })
    }

    /// Per-status counts, optionally limited to a batch.
    pub async fn status_summary(&self, batch_name: Option<&str>) -> Result<StatusCounts, StoreError> {
        with_conn!(self.pool, conn => {
            let mut query = processing_queue::table
                .group_by(processing_queue::status)
                .select((processing_queue::status, diesel::dsl::count_star()))
                .into_boxed();
            if let Some(batch) = batch_name {
                query = query.filter(processing_queue::batch_name.eq(batch));
            }
            let rows: Vec<(String, i64)> = query.load(&mut conn).await?;

            let mut counts = StatusCounts::default();
            for (status, count) in rows {
                if let Some(status) = QueueStatus::from_str(&status) {
                    counts.add(status, count as u64);
                }
            }
            Ok(counts)
        })
    }

    pub async fn pending_count(&self) -> Result<u64, StoreError> {
        with_conn!(self.pool, conn => {
            let count: i64 = processing_queue::table
                .filter(processing_queue::status.eq(QueueStatus::Pending.as_str()))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count as u64)
        })
    }

    /// Operator override: mark every non-completed entry of a batch completed.
    pub async fn force_clear_batch(&self, batch_name: &str) -> Result<usize, StoreError> {
        let now = format_datetime(Utc::now());
        with_conn!(self.pool, conn => {
            let cleared = diesel::update(
                processing_queue::table
                    .filter(processing_queue::batch_name.eq(batch_name))
                    .filter(processing_queue::status.ne(QueueStatus::Completed.as_str())),
            )
            .set((
                processing_queue::status.eq(QueueStatus::Completed.as_str()),
                processing_queue::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
            info!(batch = batch_name, cleared, "Force-cleared batch");
            Ok(cleared)
        })
    }

    /// Operator retry: move failed entries back to pending, counting the retry.
    pub async fn requeue_failed(&self, batch_name: Option<&str>) -> Result<usize, StoreError> {
        let now = format_datetime(Utc::now());
        with_conn!(self.pool, conn => {
            let requeued = match batch_name {
                Some(batch) => {
                    diesel::update(
                        processing_queue::table
                            .filter(processing_queue::status.eq(QueueStatus::Failed.as_str()))
                            .filter(processing_queue::batch_name.eq(batch)),
                    )
                    .set((
                        processing_queue::status.eq(QueueStatus::Pending.as_str()),
                        processing_queue::retry_count.eq(processing_queue::retry_count + 1),
                        processing_queue::error_message.eq(""),
                        processing_queue::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
                }
                None => {
                    diesel::update(
                        processing_queue::table
                            .filter(processing_queue::status.eq(QueueStatus::Failed.as_str())),
                    )
                    .set((
                        processing_queue::status.eq(QueueStatus::Pending.as_str()),
                        processing_queue::retry_count.eq(processing_queue::retry_count + 1),
                        processing_queue::error_message.eq(""),
                        processing_queue::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
                }
            };
            Ok(requeued)
        })
    }

    /// Delete every entry of a housekeeping batch.
    pub async fn purge_batch(&self, batch_name: &str) -> Result<usize, StoreError> {
        with_conn!(self.pool, conn => {
            let purged = diesel::delete(
                processing_queue::table.filter(processing_queue::batch_name.eq(batch_name)),
            )
            .execute(&mut conn)
            .await?;
            info!(batch = batch_name, purged, "Purged batch");
            Ok(purged)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchHints, NewArticle};
    use crate::repository::articles::test_support::{execute_sql, test_context};

    fn blocked() -> Vec<String> {
        vec!["antler.co".to_string()]
    }

    #[tokio::test]
    async fn test_enqueue_collapses_url_variants() {
        let (_dir, ctx) = test_context().await;
        let report = ctx
            .queue()
            .enqueue(
                vec![
                    "https://a.com/1".into(),
                    "https://a.com/1/".into(),
                    "https://www.a.com/1".into(),
                ],
                Some("b1"),
                &blocked(),
            )
            .await
            .unwrap();

        assert_eq!(report.total_input, 3);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped_duplicate, 2);
    }

    #[tokio::test]
    async fn test_enqueue_continues_past_failed_insert() {
        let (_dir, ctx) = test_context().await;
        execute_sql(
            &ctx,
            "CREATE TRIGGER reject_b BEFORE INSERT ON processing_queue
             WHEN NEW.url = 'https://b.com/2'
             BEGIN SELECT RAISE(ABORT, 'rejected by trigger'); END;",
        )
        .await;

        let report = ctx
            .queue()
            .enqueue(
                vec![
                    "https://a.com/1".into(),
                    "https://b.com/2".into(),
                    "https://c.com/3".into(),
                ],
                Some("partial"),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(report.accepted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "https://b.com/2");
        assert!(report.failed[0].1.contains("rejected by trigger"));

        let mut pending: Vec<String> = ctx
            .queue()
            .list_by_status(QueueStatus::Pending, Some("partial"), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        pending.sort();
        assert_eq!(pending, vec!["https://a.com/1", "https://c.com/3"]);
    }

    #[tokio::test]
    async fn test_enqueue_skips_blocked_invalid_and_stored() {
        let (_dir, ctx) = test_context().await;
        ctx.articles()
            .insert(&NewArticle::new("https://a.com/stored"))
            .await
            .unwrap();

        let report = ctx
            .queue()
            .enqueue(
                vec![
                    "https://antler.co/news".into(),
                    "https://blog.antler.co/post".into(),
                    "not a url".into(),
                    "a.com/stored".into(),
                    "https://b.com/new".into(),
                ],
                None,
                &blocked(),
            )
            .await
            .unwrap();

        assert!(report.batch_name.starts_with("batch_"));
        assert_eq!(report.skipped_blocked, 2);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(report.accepted, 1);
    }

    #[tokio::test]
    async fn test_completed_entries_still_block_reenqueue() {
        let (_dir, ctx) = test_context().await;
        let queue = ctx.queue();
        queue.enqueue(vec!["https://a.com/1".into()], None, &[]).await.unwrap();
        let entry = queue.dequeue_next().await.unwrap().unwrap();
        queue.complete(&entry.id).await.unwrap();

        let report = queue.enqueue(vec!["https://a.com/1".into()], None, &[]).await.unwrap();
        assert_eq!(report.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn test_dequeue_is_fifo_and_exclusive() {
        let (_dir, ctx) = test_context().await;
        let queue = ctx.queue();
        queue.enqueue(vec!["https://a.com/1".into()], None, &[]).await.unwrap();
        queue.enqueue(vec!["https://a.com/2".into()], None, &[]).await.unwrap();

        let first = queue.dequeue_next().await.unwrap().unwrap();
        let second = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(first.url, "https://a.com/1");
        assert_eq!(first.status, QueueStatus::Processing);
        assert_eq!(second.url, "https://a.com/2");
        assert!(queue.dequeue_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hints_round_trip_through_queue() {
        let (_dir, ctx) = test_context().await;
        let queue = ctx.queue();
        let candidate = Candidate {
            url: "https://a.com/1".into(),
            hints: BatchHints {
                title: Some("Given title".into()),
                publish_date: Some("2024-03-01".into()),
                brand: Some("Acme".into()),
            },
        };
        queue.enqueue(vec![candidate.clone()], None, &[]).await.unwrap();

        let entry = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(entry.hints, candidate.hints);
    }

    #[tokio::test]
    async fn test_terminal_transitions_are_idempotent() {
        let (_dir, ctx) = test_context().await;
        let queue = ctx.queue();
        queue.enqueue(vec!["https://a.com/1".into()], None, &[]).await.unwrap();
        let entry = queue.dequeue_next().await.unwrap().unwrap();

        let long = "x".repeat(2000);
        assert!(queue.fail(&entry.id, &long).await.unwrap());
        assert!(queue.fail(&entry.id, &long).await.unwrap());

        let stored = queue.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(stored.error_message.chars().count(), MAX_ERROR_LEN);
        assert!(!queue.complete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_operator_actions() {
        let (_dir, ctx) = test_context().await;
        let queue = ctx.queue();
        queue
            .enqueue(
                vec!["https://a.com/1".into(), "https://a.com/2".into()],
                Some("test"),
                &[],
            )
            .await
            .unwrap();
        let entry = queue.dequeue_next().await.unwrap().unwrap();
        queue.fail(&entry.id, "timeout").await.unwrap();

        let counts = queue.status_summary(Some("test")).await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);

        assert_eq!(queue.requeue_failed(Some("test")).await.unwrap(), 1);
        let retried = queue.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(retried.status, QueueStatus::Pending);
        assert_eq!(retried.retry_count, 1);

        assert_eq!(queue.force_clear_batch("test").await.unwrap(), 2);
        let completed = queue
            .list_by_status(QueueStatus::Completed, Some("test"), 10)
            .await
            .unwrap();
        assert_eq!(completed.len(), 2);

        assert_eq!(queue.purge_batch("test").await.unwrap(), 2);
        assert_eq!(queue.status_summary(None).await.unwrap().total(), 0);
    }
}
