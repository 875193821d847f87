//! Queue ingestion service.
//!
//! Admits URLs to the processing queue and drains it with a bounded pool of
//! workers. Separated from UI concerns: progress is reported through
//! [`IngestEvent`]s on a channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::retry::RetryPolicy;
use crate::config::{PipelineConfig, Settings};
use crate::error::{ExtractError, StoreError};
use crate::models::{parse_date_input, BatchHints, Candidate, EnqueueReport, NewArticle, QueueEntry};
use crate::repository::{DbContext, InsertOutcome};
use crate::scrapers::{ContentExtractor, ExtractMode, ExtractedArticle};
use crate::utils::{contains_any, extract_domain};

/// Consecutive claim errors after which a worker gives up.
const MAX_CLAIM_ERRORS: usize = 5;

/// Events emitted while processing the queue.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// A worker claimed an entry.
    Started { worker_id: usize, url: String },
    /// The article was stored.
    Completed {
        worker_id: usize,
        url: String,
        id: i64,
        snippet: String,
    },
    /// The URL was already stored; the entry was completed without an insert.
    Duplicate { worker_id: usize, url: String },
    /// Extraction or storage failed; the entry is marked failed.
    Failed {
        worker_id: usize,
        url: String,
        error: String,
    },
}

/// Totals for a processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub completed: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    /// Pending entries left when the run stopped.
    pub remaining: u64,
    /// Entries whose terminal state could not be written; they are still
    /// marked `processing`.
    pub unrecorded: usize,
}

/// Result of handling one URL.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Inserted {
        id: i64,
        article: ExtractedArticle,
    },
    Duplicate,
    Failed(String),
}

/// Service that moves URLs from the queue into the record store.
#[derive(Clone)]
pub struct IngestService {
    ctx: DbContext,
    extractor: Arc<dyn ContentExtractor>,
    pipeline: Arc<PipelineConfig>,
    light_timeout: Duration,
    full_timeout: Duration,
    retry: RetryPolicy,
}

impl IngestService {
    pub fn new(
        ctx: DbContext,
        extractor: Arc<dyn ContentExtractor>,
        pipeline: PipelineConfig,
        settings: &Settings,
    ) -> Self {
        Self {
            ctx,
            extractor,
            pipeline: Arc::new(pipeline),
            light_timeout: settings.light_timeout,
            full_timeout: settings.full_timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Admit candidates to the queue, skipping blocked and known URLs.
    pub async fn enqueue(
        &self,
        candidates: Vec<Candidate>,
        batch_name: Option<&str>,
    ) -> Result<EnqueueReport, StoreError> {
        self.ctx
            .queue()
            .enqueue(candidates, batch_name, &self.pipeline.blocked_domains)
            .await
    }

    /// Extract under the hard per-mode timeout.
    async fn extract(&self, url: &str, mode: ExtractMode) -> Result<ExtractedArticle, ExtractError> {
        let timeout = match mode {
            ExtractMode::Light => self.light_timeout,
            ExtractMode::Full => self.full_timeout,
        };
        match tokio::time::timeout(timeout, self.extractor.extract(url, mode)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout(timeout)),
        }
    }

    /// Build the insert from extracted data, letting batch hints win.
    fn build_article(
        &self,
        url: &str,
        extracted: &ExtractedArticle,
        hints: &BatchHints,
        mode: ExtractMode,
    ) -> NewArticle {
        let mut article = NewArticle::new(url);
        article.domain = if extracted.domain.is_empty() {
            extract_domain(url)
        } else {
            extracted.domain.clone()
        };
        article.title = hints
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| extracted.title.clone());
        article.publish_date = hints
            .publish_date
            .as_deref()
            .and_then(parse_date_input)
            .or(extracted.publish_date);

        // Light mode only yields a snippet; the body arrives via backfill.
        if mode == ExtractMode::Full {
            article.content = extracted.content.clone();
            article.text_scraped = true;
        }

        if let Some(brand) = hints.brand.as_deref().filter(|b| !b.trim().is_empty()) {
            article.matched_portcos = brand.trim().to_string();
            article.tagged_antler = contains_any(brand, &self.pipeline.headline_keywords);
        }
        article.data_ingestion = !hints.is_empty();
        article
    }

    /// Extract and store one URL. Never returns an error: failures are
    /// reported as [`IngestOutcome::Failed`].
    pub async fn ingest_url(&self, url: &str, hints: &BatchHints, mode: ExtractMode) -> IngestOutcome {
        let extracted = match self.extract(url, mode).await {
            Ok(extracted) => extracted,
            Err(e) => return IngestOutcome::Failed(e.to_string()),
        };

        let article = self.build_article(url, &extracted, hints, mode);
        match self.ctx.articles().insert(&article).await {
            Ok(InsertOutcome::Inserted { id, .. }) => {
                if !article.domain.is_empty() {
                    if let Err(e) = self.ctx.domains().ensure(&article.domain, article.page_rank).await {
                        warn!("Failed to record domain {}: {}", article.domain, e);
                    }
                }
                IngestOutcome::Inserted { id, article: extracted }
            }
            Ok(InsertOutcome::Duplicate) => IngestOutcome::Duplicate,
            Err(e) => IngestOutcome::Failed(e.to_string()),
        }
    }

    /// Process one claimed entry and record its terminal state.
    ///
    /// The flag is `false` when no terminal state could be written and the
    /// entry is left `processing`.
    pub async fn process_entry(&self, entry: &QueueEntry, mode: ExtractMode) -> (IngestOutcome, bool) {
        let outcome = self.ingest_url(&entry.url, &entry.hints, mode).await;
        let recorded = self.record_outcome(entry, &outcome).await;
        (outcome, recorded)
    }

    /// Write the entry's terminal state, retrying transient errors.
    ///
    /// A completion that cannot be written falls back to marking the entry
    /// failed, so it shows up for `queue retry`.
    async fn record_outcome(&self, entry: &QueueEntry, outcome: &IngestOutcome) -> bool {
        let queue = self.ctx.queue();
        let written = match outcome {
            IngestOutcome::Inserted { .. } | IngestOutcome::Duplicate => {
                self.retry
                    .run("complete queue entry", || queue.complete(&entry.id))
                    .await
            }
            IngestOutcome::Failed(message) => {
                self.retry
                    .run("fail queue entry", || queue.fail(&entry.id, message))
                    .await
            }
        };
        let cause = match written {
            Ok(_) => return true,
            Err(e) => e,
        };

        if !matches!(outcome, IngestOutcome::Failed(_)) {
            let message = format!("could not record completion: {}", cause);
            let fallback = self
                .retry
                .run("fail queue entry", || queue.fail(&entry.id, &message))
                .await;
            if fallback.is_ok() {
                warn!(url = %entry.url, error = %cause, "Marked entry failed after completion write failed");
                return true;
            }
        }

        error!(
            entry = %entry.id,
            url = %entry.url,
            error = %cause,
            "Could not record queue state; entry left processing"
        );
        false
    }

    /// Drain the queue with `workers` concurrent workers.
    ///
    /// Stops when no pending entries remain or `limit` entries have been
    /// claimed.
    pub async fn run(
        &self,
        workers: usize,
        limit: Option<usize>,
        mode: ExtractMode,
        event_tx: mpsc::Sender<IngestEvent>,
    ) -> Result<ProcessReport, StoreError> {
        let claimed = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let duplicates = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let unrecorded = Arc::new(AtomicUsize::new(0));

        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let service = self.clone();
            let claimed = claimed.clone();
            let completed = completed.clone();
            let duplicates = duplicates.clone();
            let failed = failed.clone();
            let unrecorded = unrecorded.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                let queue = service.ctx.queue();
                let mut claim_errors = 0;

                loop {
                    if let Some(max) = limit {
                        if claimed.fetch_add(1, Ordering::SeqCst) >= max {
                            break;
                        }
                    }

                    let entry = match queue.dequeue_next().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => {
                            claim_errors += 1;
                            warn!("Worker {} failed to claim entry: {}", worker_id, e);
                            if claim_errors >= MAX_CLAIM_ERRORS {
                                break;
                            }
                            if limit.is_some() {
                                claimed.fetch_sub(1, Ordering::SeqCst);
                            }
                            tokio::time::sleep(Duration::from_millis(500)).await;
                            continue;
                        }
                    };
                    claim_errors = 0;

                    let url = entry.url.clone();
                    let _ = event_tx
                        .send(IngestEvent::Started {
                            worker_id,
                            url: url.clone(),
                        })
                        .await;

                    let (outcome, recorded) = service.process_entry(&entry, mode).await;
                    if !recorded {
                        unrecorded.fetch_add(1, Ordering::Relaxed);
                    }
                    let event = match outcome {
                        IngestOutcome::Inserted { id, article } => {
                            completed.fetch_add(1, Ordering::Relaxed);
                            IngestEvent::Completed {
                                worker_id,
                                url,
                                id,
                                snippet: article.content,
                            }
                        }
                        IngestOutcome::Duplicate => {
                            duplicates.fetch_add(1, Ordering::Relaxed);
                            IngestEvent::Duplicate { worker_id, url }
                        }
                        IngestOutcome::Failed(error) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            IngestEvent::Failed {
                                worker_id,
                                url,
                                error,
                            }
                        }
                    };
                    let _ = event_tx.send(event).await;
                }
                debug!("Worker {} finished", worker_id);
            });

            handles.push(handle);
        }

        // Wait for all workers
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Ingest worker panicked: {}", e);
            }
        }

        Ok(ProcessReport {
            completed: completed.load(Ordering::Relaxed),
            skipped_duplicate: duplicates.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            remaining: self.ctx.queue().pending_count().await?,
            unrecorded: unrecorded.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::QueueStatus;
    use crate::repository::articles::test_support::{execute_sql, test_context};

    struct StaticExtractor;

    #[async_trait]
    impl ContentExtractor for StaticExtractor {
        async fn extract(&self, url: &str, mode: ExtractMode) -> Result<ExtractedArticle, ExtractError> {
            if url.contains("broken") {
                return Err(ExtractError::Status(404));
            }
            Ok(ExtractedArticle {
                title: "Extracted title".into(),
                content: match mode {
                    ExtractMode::Light => "Antler snippet.".into(),
                    ExtractMode::Full => "Full body text about Antler and friends.".into(),
                },
                publish_date: None,
                domain: extract_domain(url),
            })
        }
    }

    fn service(ctx: &DbContext) -> IngestService {
        IngestService::new(
            ctx.clone(),
            Arc::new(StaticExtractor),
            PipelineConfig::default(),
            &Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_run_processes_queue() {
        let (_dir, ctx) = test_context().await;
        let svc = service(&ctx);
        svc.enqueue(
            vec![
                "https://a.com/1".into(),
                "https://a.com/2".into(),
                "https://a.com/broken".into(),
            ],
            Some("t"),
        )
        .await
        .unwrap();

        let (tx, mut rx) = mpsc::channel(100);
        let report = svc.run(2, None, ExtractMode::Light, tx).await.unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 0);

        let mut events = 0;
        while rx.try_recv().is_ok() {
            events += 1;
        }
        assert_eq!(events, 6);

        let stored = ctx.articles().get_all().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|a| a.content.is_empty() && !a.text_scraped));
        assert!(ctx.domains().get("a.com").await.unwrap().is_some());

        let failed = ctx
            .queue()
            .list_by_status(QueueStatus::Failed, None, 10)
            .await
            .unwrap();
        assert_eq!(failed[0].error_message, "HTTP 404");
    }

    #[tokio::test]
    async fn test_limit_bounds_claims() {
        let (_dir, ctx) = test_context().await;
        let svc = service(&ctx);
        let urls: Vec<Candidate> = (0..5).map(|i| format!("https://a.com/{i}").into()).collect();
        svc.enqueue(urls, None).await.unwrap();

        let (tx, _rx) = mpsc::channel(100);
        let report = svc.run(3, Some(2), ExtractMode::Light, tx).await.unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.remaining, 3);
    }

    #[tokio::test]
    async fn test_hints_take_precedence() {
        let (_dir, ctx) = test_context().await;
        let svc = service(&ctx);
        let hints = BatchHints {
            title: Some("Given title".into()),
            publish_date: Some("2024-03-05".into()),
            brand: Some("Antler Elevate".into()),
        };

        let outcome = svc.ingest_url("https://a.com/1", &hints, ExtractMode::Full).await;
        assert!(matches!(outcome, IngestOutcome::Inserted { id: 1, .. }));

        let article = ctx.articles().get_by_id(1).await.unwrap().unwrap();
        assert_eq!(article.title, "Given title");
        assert_eq!(article.publish_date.format("%Y-%m-%d").to_string(), "2024-03-05");
        assert_eq!(article.matched_portcos, "Antler Elevate");
        assert!(article.tagged_antler);
        assert!(article.data_ingestion);
        assert!(article.text_scraped);
        assert!(!article.content.is_empty());

        let again = svc.ingest_url("a.com/1/", &BatchHints::default(), ExtractMode::Light).await;
        assert_eq!(again, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_unwritable_completion_marks_entry_failed() {
        let (_dir, ctx) = test_context().await;
        let svc = service(&ctx);
        svc.enqueue(vec!["https://a.com/1".into()], None).await.unwrap();
        execute_sql(
            &ctx,
            "CREATE TRIGGER no_completions BEFORE UPDATE ON processing_queue
             WHEN NEW.status = 'completed'
             BEGIN SELECT RAISE(ABORT, 'completions disabled'); END;",
        )
        .await;

        let (tx, _rx) = mpsc::channel(100);
        let report = svc.run(1, None, ExtractMode::Light, tx).await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.unrecorded, 0);

        let failed = ctx
            .queue()
            .list_by_status(QueueStatus::Failed, None, 10)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error_message.contains("completions disabled"));
    }

    #[tokio::test]
    async fn test_unrecorded_outcome_is_counted() {
        let (_dir, ctx) = test_context().await;
        let svc = service(&ctx);
        svc.enqueue(vec!["https://a.com/broken".into()], None)
            .await
            .unwrap();
        execute_sql(
            &ctx,
            "CREATE TRIGGER frozen BEFORE UPDATE ON processing_queue
             WHEN OLD.status = 'processing'
             BEGIN SELECT RAISE(ABORT, 'queue frozen'); END;",
        )
        .await;

        let (tx, _rx) = mpsc::channel(100);
        let report = svc.run(1, None, ExtractMode::Light, tx).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.unrecorded, 1);

        let summary = ctx.queue().status_summary(None).await.unwrap();
        assert_eq!(summary.processing, 1);
    }
}
