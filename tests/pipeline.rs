//! Pipeline Tests
//!
//! End-to-end behaviour of normalization, dedup, the queue, enrichment and
//! reconciliation against a temporary SQLite database.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel_async::RunQueryDsl;
use tokio::sync::mpsc;

use mediatrack::config::{PipelineConfig, Settings};
use mediatrack::error::ExtractError;
use mediatrack::models::{Candidate, NewArticle, QueueStatus};
use mediatrack::repository::diesel_models::NewArticleRecord;
use mediatrack::repository::{format_datetime, DbContext};
use mediatrack::schema::articles;
use mediatrack::scrapers::{ContentExtractor, ExtractMode, ExtractedArticle};
use mediatrack::services::{
    check_existing, reconcile, EnrichmentService, IngestService, ReconcileOptions, RetryPolicy,
};
use mediatrack::utils::{extract_domain, normalize_url};

/// Extractor that answers from memory, optionally after a delay.
struct FakeExtractor {
    delay: Duration,
}

impl FakeExtractor {
    fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    fn hanging() -> Self {
        Self {
            delay: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, url: &str, _mode: ExtractMode) -> Result<ExtractedArticle, ExtractError> {
        tokio::time::sleep(self.delay).await;
        Ok(ExtractedArticle {
            title: format!("Story at {}", url),
            content: "Antler portfolio news.".to_string(),
            publish_date: None,
            domain: extract_domain(url),
        })
    }
}

async fn test_context() -> (tempfile::TempDir, DbContext) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::open(&dir.path().join("pipeline.db"), Duration::ZERO)
        .await
        .unwrap();
    (dir, ctx)
}

fn service(ctx: &DbContext, extractor: FakeExtractor, settings: &Settings) -> IngestService {
    IngestService::new(
        ctx.clone(),
        Arc::new(extractor),
        PipelineConfig::default(),
        settings,
    )
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_normalize_is_idempotent() {
    let shapes = [
        "example.com/a",
        "http://example.com/a/",
        "https://www.example.com/a",
        "/example.com/a",
        "  https://Example.com/a?utm_source=x  ",
        "www.www.example.com/",
        "https://",
    ];
    for shape in shapes {
        let once = normalize_url(shape);
        assert_eq!(normalize_url(&once), once, "not idempotent for {:?}", shape);
    }
    assert_eq!(normalize_url("http://example.com/a/"), "https://example.com/a");
}

#[tokio::test]
async fn test_dedup_reports_existing_and_admits_one_new() {
    let (_dir, ctx) = test_context().await;
    let repo = ctx.articles();
    repo.insert(&NewArticle::new("https://a.com/A")).await.unwrap();
    repo.insert(&NewArticle::new("https://a.com/B")).await.unwrap();

    let candidates = strings(&["https://a.com/A", "https://a.com/B", "https://a.com/C", "https://a.com/C"]);
    let report = check_existing(&repo, &candidates, 100).await;
    assert!(report.is_complete());
    assert_eq!(
        report.existing.into_iter().collect::<Vec<_>>(),
        strings(&["https://a.com/A", "https://a.com/B"])
    );

    let enqueued = ctx
        .queue()
        .enqueue(
            candidates.into_iter().map(Candidate::from).collect(),
            Some("dedup"),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(enqueued.accepted, 1);
    assert_eq!(enqueued.skipped_duplicate, 3);

    let pending = ctx
        .queue()
        .list_by_status(QueueStatus::Pending, Some("dedup"), 10)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "https://a.com/C");
}

#[tokio::test]
async fn test_concurrent_dequeue_claims_once() {
    let (_dir, ctx) = test_context().await;
    ctx.queue()
        .enqueue(vec![Candidate::from("https://a.com/only")], None, &[])
        .await
        .unwrap();

    let (left, right) = (ctx.queue(), ctx.queue());
    let (first, second) = tokio::join!(left.dequeue_next(), right.dequeue_next());
    let claimed: Vec<_> = [first.unwrap(), second.unwrap()].into_iter().flatten().collect();

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, QueueStatus::Processing);
    assert_eq!(ctx.queue().pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_enrichment_reaches_fixed_point() {
    let (_dir, ctx) = test_context().await;
    let settings = Settings::default();
    let svc = service(&ctx, FakeExtractor::instant(), &settings);
    svc.enqueue(
        strings(&["https://news.co.uk/1", "https://blog.com/2", "https://blog.com/3"])
            .into_iter()
            .map(Candidate::from)
            .collect(),
        None,
    )
    .await
    .unwrap();
    let (tx, _rx) = mpsc::channel(100);
    svc.run(2, None, ExtractMode::Full, tx).await.unwrap();

    let enrichment = EnrichmentService::new(ctx.clone(), PipelineConfig::default());
    enrichment.run_full_enrichment().await;
    let after_first = ctx.articles().get_all_raw().await.unwrap();

    let report = enrichment.run_full_enrichment().await;
    let after_second = ctx.articles().get_all_raw().await.unwrap();

    assert!(report.is_success());
    assert_eq!(after_first, after_second);
    assert!(after_first.iter().all(|r| r.language.as_deref() == Some("en")));
}

async fn append_duplicate(ctx: &DbContext, url: &str, written_at: chrono::DateTime<Utc>, filled: usize) -> i64 {
    let mut record = NewArticleRecord::with_defaults(url, &normalize_url(url), written_at);
    record.updated_at = format_datetime(written_at);
    let fills: [fn(&mut NewArticleRecord); 5] = [
        |r| r.title = "Title".into(),
        |r| r.domain = "a.com".into(),
        |r| r.content = "Body".into(),
        |r| r.country = Some("US".into()),
        |r| r.language = Some("en".into()),
    ];
    for fill in fills.iter().take(filled) {
        fill(&mut record);
    }

    let mut conn = ctx.pool().get().await.unwrap();
    diesel::insert_into(articles::table)
        .values(&record)
        .execute(&mut conn)
        .await
        .unwrap();
    ctx.articles()
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.row_key)
        .max()
        .unwrap()
}

#[tokio::test]
async fn test_reconciler_keeps_most_complete_and_skips_recent() {
    let (_dir, ctx) = test_context().await;
    let old = Utc::now() - chrono::Duration::hours(4);

    let two = append_duplicate(&ctx, "https://a.com/story", old, 2).await;
    let five = append_duplicate(&ctx, "a.com/story/", old, 5).await;
    let three = append_duplicate(&ctx, "https://www.a.com/story", old, 3).await;
    let recent = append_duplicate(&ctx, "https://a.com/story", Utc::now(), 1).await;

    let options = ReconcileOptions {
        recency_window: Duration::from_secs(90 * 60),
        retry: RetryPolicy::none(),
        ..Default::default()
    };
    let report = reconcile(&ctx, options).await.unwrap();

    assert_eq!(report.kept, 1);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.deferred, 1);

    let remaining: Vec<i64> = ctx
        .articles()
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.row_key)
        .collect();
    assert_eq!(remaining, vec![five, recent]);
    assert!(!remaining.contains(&two) && !remaining.contains(&three));
}

#[tokio::test]
async fn test_insert_then_lookup_uses_normalized_form() {
    let (_dir, ctx) = test_context().await;
    let repo = ctx.articles();
    repo.insert(&NewArticle::new("http://Example.com/a/")).await.unwrap();

    let report = check_existing(&repo, &strings(&["example.com/a"]), 100).await;
    assert!(report.existing.contains("example.com/a"));

    let stored = repo.get_by_normalized_url("https://example.com/a").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, "http://Example.com/a/");
}

#[tokio::test]
async fn test_enqueue_collapses_url_variants() {
    let (_dir, ctx) = test_context().await;
    let report = ctx
        .queue()
        .enqueue(
            strings(&["https://a.com/1", "https://a.com/1/", "https://www.a.com/1"])
                .into_iter()
                .map(Candidate::from)
                .collect(),
            None,
            &[],
        )
        .await
        .unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped_duplicate, 2);
    assert_eq!(report.total_input, 3);
}

#[tokio::test]
async fn test_extractor_timeout_fails_entry_without_record() {
    let (_dir, ctx) = test_context().await;
    let mut settings = Settings::default();
    settings.light_timeout = Duration::from_millis(50);

    let svc = service(&ctx, FakeExtractor::hanging(), &settings);
    svc.enqueue(vec![Candidate::from("https://slow.com/article")], None)
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(100);
    let report = svc.run(1, None, ExtractMode::Light, tx).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 0);

    let failed = ctx
        .queue()
        .list_by_status(QueueStatus::Failed, None, 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(!failed[0].error_message.is_empty());
    assert!(failed[0].error_message.chars().count() <= 500);
    assert!(failed[0].error_message.contains("timed out"));
    assert_eq!(ctx.articles().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_ingest_is_counted_not_failed() {
    let (_dir, ctx) = test_context().await;
    let settings = Settings::default();
    let svc = service(&ctx, FakeExtractor::instant(), &settings);

    // Queued first, stored directly afterwards: the worker finds a duplicate.
    svc.enqueue(vec![Candidate::from("https://a.com/race")], None)
        .await
        .unwrap();
    ctx.articles()
        .insert(&NewArticle::new("https://a.com/race"))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(100);
    let report = svc.run(1, None, ExtractMode::Light, tx).await.unwrap();
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(report.failed, 0);

    let summary = ctx.queue().status_summary(None).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(ctx.articles().count().await.unwrap(), 1);
}
