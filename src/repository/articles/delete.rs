//! Hard deletes.
//!
//! Every delete reports the rows actually removed. Rows still inside the
//! write buffer are never removed; they are counted as `buffered` so the
//! caller can retry them on a later pass.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;

use super::{ArticleRepository, DeleteOutcome};
use crate::error::StoreError;
use crate::repository::util::like_pattern;
use crate::schema::articles;
use crate::with_conn;

impl ArticleRepository {
    /// Delete every row carrying one of these numeric ids.
    pub async fn delete_by_ids(&self, ids: &[i64]) -> Result<DeleteOutcome, StoreError> {
        if ids.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        let cutoff = self.buffer_cutoff(Utc::now());

        with_conn!(self.pool, conn => {
            let buffered: i64 = articles::table
                .filter(articles::id.eq_any(ids))
                .filter(articles::inserted_at.gt(&cutoff))
                .count()
                .get_result(&mut conn)
                .await?;
            let deleted = diesel::delete(
                articles::table
                    .filter(articles::id.eq_any(ids))
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .execute(&mut conn)
            .await?;

            Ok(DeleteOutcome {
                requested: ids.len(),
                deleted,
                buffered: buffered as usize,
            })
        })
    }

    /// Delete rows by storage key.
    pub async fn delete_by_row_keys(&self, row_keys: &[i64]) -> Result<DeleteOutcome, StoreError> {
        if row_keys.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        let cutoff = self.buffer_cutoff(Utc::now());

        with_conn!(self.pool, conn => {
            let buffered: i64 = articles::table
                .filter(articles::row_key.eq_any(row_keys))
                .filter(articles::inserted_at.gt(&cutoff))
                .count()
                .get_result(&mut conn)
                .await?;
            let deleted = diesel::delete(
                articles::table
                    .filter(articles::row_key.eq_any(row_keys))
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .execute(&mut conn)
            .await?;

            Ok(DeleteOutcome {
                requested: row_keys.len(),
                deleted,
                buffered: buffered as usize,
            })
        })
    }

    /// Delete rows whose raw or normalized URL matches a pattern.
    ///
    /// `*` is a wildcard; without one the pattern matches as a substring.
    pub async fn delete_by_url_pattern(&self, pattern: &str) -> Result<DeleteOutcome, StoreError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(StoreError::InvalidField("empty url pattern".to_string()));
        }
        let like = like_pattern(pattern);
        let cutoff = self.buffer_cutoff(Utc::now());

        with_conn!(self.pool, conn => {
            let matches = || {
                articles::url
                    .like(like.clone())
                    .escape('\\')
                    .or(articles::normalized_url.like(like.clone()).escape('\\'))
            };
            let requested: i64 = articles::table
                .filter(matches())
                .count()
                .get_result(&mut conn)
                .await?;
            let deleted = diesel::delete(
                articles::table
                    .filter(matches())
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .execute(&mut conn)
            .await?;

            info!(pattern, deleted, "Deleted articles by url pattern");
            Ok(DeleteOutcome {
                requested: requested as usize,
                deleted,
                buffered: (requested as usize).saturating_sub(deleted),
            })
        })
    }

    /// Delete rows that never received a numeric id.
    pub async fn purge_null_ids(&self) -> Result<DeleteOutcome, StoreError> {
        let cutoff = self.buffer_cutoff(Utc::now());

        with_conn!(self.pool, conn => {
            let requested: i64 = articles::table
                .filter(articles::id.is_null())
                .count()
                .get_result(&mut conn)
                .await?;
            let deleted = diesel::delete(
                articles::table
                    .filter(articles::id.is_null())
                    .filter(articles::inserted_at.le(&cutoff)),
            )
            .execute(&mut conn)
            .await?;

            Ok(DeleteOutcome {
                requested: requested as usize,
                deleted,
                buffered: (requested as usize).saturating_sub(deleted),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::super::test_support::*;
    use crate::models::NewArticle;

    #[tokio::test]
    async fn test_delete_reports_affected_rows() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles();
        repo.insert(&NewArticle::new("https://a.com/1")).await.unwrap();
        repo.insert(&NewArticle::new("https://a.com/2")).await.unwrap();

        let outcome = repo.delete_by_ids(&[1, 2, 99]).await.unwrap();
        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.buffered, 0);
    }

    #[tokio::test]
    async fn test_delete_skips_buffered_rows() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles().with_write_buffer(Duration::from_secs(3600));
        repo.insert(&NewArticle::new("https://a.com/1")).await.unwrap();

        let outcome = repo.delete_by_ids(&[1]).await.unwrap();
        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.buffered, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_url_pattern() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles();
        repo.insert(&NewArticle::new("https://a.com/1")).await.unwrap();
        repo.insert(&NewArticle::new("https://a.com/2")).await.unwrap();
        repo.insert(&NewArticle::new("https://b.com/1")).await.unwrap();

        let outcome = repo.delete_by_url_pattern("https://a.com/*").await.unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete_by_url_pattern("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_purge_null_ids() {
        let (_dir, ctx) = test_context().await;
        let repo = ctx.articles();
        repo.insert(&NewArticle::new("https://a.com/1")).await.unwrap();
        insert_raw(&ctx, "https://a.com/orphan", Utc::now(), |r| r.id = None).await;

        let outcome = repo.purge_null_ids().await.unwrap();
        assert_eq!(outcome.deleted, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
