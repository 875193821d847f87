//! Enrichment service.
//!
//! A full pass is a fixed sequence of bulk steps over the record store.
//! Every step only fills unset values or recomputes deterministic ones, so
//! re-running the pass on unchanged data changes nothing. A failing step is
//! reported and the pass moves on; earlier steps are not rolled back.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::models::Article;
use crate::repository::{DbContext, FlagColumn, MatchUpdate, TermField};
use crate::utils::{contains_any, find_term_context};

/// Quiet period after an insert signal before a background pass starts, so
/// a burst of inserts triggers one pass.
const BACKGROUND_DEBOUNCE: Duration = Duration::from_millis(500);

/// Outcome of one enrichment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub name: &'static str,
    /// Rows changed, when the step succeeded.
    pub changed: Option<usize>,
    pub error: Option<String>,
}

/// Outcome of a full enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub steps: Vec<StepResult>,
}

impl EnrichmentReport {
    /// True when every step succeeded.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }

    pub fn total_changed(&self) -> usize {
        self.steps.iter().filter_map(|s| s.changed).sum()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    async fn record<F>(&mut self, name: &'static str, step: F)
    where
        F: Future<Output = Result<usize, StoreError>>,
    {
        let result = match step.await {
            Ok(changed) => {
                debug!(step = name, changed, "Enrichment step finished");
                StepResult {
                    name,
                    changed: Some(changed),
                    error: None,
                }
            }
            Err(e) => {
                warn!(step = name, "Enrichment step failed: {}", e);
                StepResult {
                    name,
                    changed: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.steps.push(result);
    }
}

/// Service that backfills derived fields on stored articles.
#[derive(Clone)]
pub struct EnrichmentService {
    ctx: DbContext,
    pipeline: Arc<PipelineConfig>,
}

impl EnrichmentService {
    pub fn new(ctx: DbContext, pipeline: PipelineConfig) -> Self {
        Self {
            ctx,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Run every enrichment step in order.
    pub async fn run_full_enrichment(&self) -> EnrichmentReport {
        let articles = self.ctx.articles();
        let mut report = EnrichmentReport::default();

        report.record("month", articles.fill_missing_months(Utc::now())).await;
        report.record("defaults", articles.fill_null_defaults()).await;
        report.record("domain", self.backfill_domains()).await;
        report
            .record("language", articles.fill_default_language(&self.pipeline.default_language))
            .await;

        // The remaining steps read the table after defaults are in place.
        match articles.get_mutable().await {
            Ok(snapshot) => {
                report.record("headline", self.recompute_headline(&snapshot)).await;
                report
                    .record("kill_pill", self.match_terms(&snapshot, TermField::KillPill))
                    .await;
                report
                    .record("unwanted", self.match_terms(&snapshot, TermField::Unwanted))
                    .await;
                report.record("tagged_antler", self.tag_antler(&snapshot)).await;
                report.record("portco", self.match_portcos(&snapshot)).await;
            }
            Err(e) => {
                warn!("Failed to load articles for enrichment: {}", e);
                for name in ["headline", "kill_pill", "unwanted", "tagged_antler", "portco"] {
                    report.steps.push(StepResult {
                        name,
                        changed: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        report.record("is_complete", self.recompute_completeness()).await;

        info!(
            changed = report.total_changed(),
            failed = report.failed_steps().count(),
            "Enrichment pass finished"
        );
        report
    }

    /// Ensure domain metadata exists for every stored domain and copy it
    /// into rows still at their defaults.
    async fn backfill_domains(&self) -> Result<usize, StoreError> {
        let mut page_ranks: BTreeMap<String, f64> = BTreeMap::new();
        for article in self.ctx.articles().get_mutable().await? {
            if !article.domain.is_empty() {
                page_ranks.entry(article.domain).or_insert(article.page_rank);
            }
        }

        let domains = self.ctx.domains();
        let articles = self.ctx.articles();
        let mut changed = 0;
        for (domain, page_rank) in page_ranks {
            let meta = domains.ensure(&domain, page_rank).await?;
            changed += articles.backfill_from_domain(&meta).await?;
        }
        Ok(changed)
    }

    /// Recompute `antler_in_headline` from the title on every run.
    async fn recompute_headline(&self, snapshot: &[Article]) -> Result<usize, StoreError> {
        let rows = snapshot
            .iter()
            .filter_map(|a| {
                let flag = contains_any(&a.title, &self.pipeline.headline_keywords);
                (flag != a.antler_in_headline).then_some((a.row_key, flag))
            })
            .collect();
        self.ctx.articles().set_flags(FlagColumn::AntlerInHeadline, rows).await
    }

    /// Flag rows whose content mentions a configured term. Rows already
    /// flagged are left as they are.
    async fn match_terms(&self, snapshot: &[Article], field: TermField) -> Result<usize, StoreError> {
        let (terms, already): (&Vec<String>, fn(&Article) -> bool) = match field {
            TermField::KillPill => (&self.pipeline.kill_pill_terms, |a: &Article| a.kill_pill),
            TermField::Unwanted => (&self.pipeline.unwanted_terms, |a: &Article| a.unwanted),
        };
        if terms.is_empty() {
            return Ok(0);
        }

        let matches = snapshot
            .iter()
            .filter(|a| !already(a))
            .filter_map(|a| {
                find_term_context(&a.content, terms).map(|(count, context)| MatchUpdate {
                    row_key: a.row_key,
                    count,
                    context,
                })
            })
            .collect();
        self.ctx.articles().set_term_matches(field, matches).await
    }

    /// Set `tagged_antler` where the title or content mentions a keyword.
    async fn tag_antler(&self, snapshot: &[Article]) -> Result<usize, StoreError> {
        let keywords = &self.pipeline.content_keywords;
        let rows = snapshot
            .iter()
            .filter(|a| !a.tagged_antler)
            .filter(|a| contains_any(&a.title, keywords) || contains_any(&a.content, keywords))
            .map(|a| (a.row_key, true))
            .collect();
        self.ctx.articles().set_flags(FlagColumn::TaggedAntler, rows).await
    }

    /// Fill `matched_portcos` from portfolio names found in the text, then
    /// tag every row that has a match.
    async fn match_portcos(&self, snapshot: &[Article]) -> Result<usize, StoreError> {
        let names = &self.pipeline.portfolio_companies;
        let rows: Vec<(i64, String)> = snapshot
            .iter()
            .filter(|a| a.matched_portcos.is_empty())
            .filter_map(|a| {
                let found: Vec<&str> = names
                    .iter()
                    .filter(|name| {
                        let name = std::slice::from_ref(*name);
                        contains_any(&a.title, name) || contains_any(&a.content, name)
                    })
                    .map(|name| name.trim())
                    .collect();
                (!found.is_empty()).then(|| (a.row_key, found.join(", ")))
            })
            .collect();

        let articles = self.ctx.articles();
        let filled = articles.set_matched_portcos(rows).await?;
        Ok(filled + articles.tag_portco_from_matches().await?)
    }

    /// Recompute `is_complete` against the current row contents.
    async fn recompute_completeness(&self) -> Result<usize, StoreError> {
        let rows = self
            .ctx
            .articles()
            .get_mutable()
            .await?
            .into_iter()
            .filter_map(|a| {
                let complete = a.meets_completeness();
                (complete != a.is_complete).then_some((a.row_key, complete))
            })
            .collect();
        self.ctx.articles().set_flags(FlagColumn::IsComplete, rows).await
    }

    /// Run a pass whenever an article insert is signalled.
    ///
    /// The task runs until aborted.
    pub fn spawn_background(self) -> JoinHandle<()> {
        let signal = self.ctx.enrichment_signal();
        tokio::spawn(async move {
            loop {
                signal.notified().await;
                tokio::time::sleep(BACKGROUND_DEBOUNCE).await;
                let report = self.run_full_enrichment().await;
                if !report.is_success() {
                    warn!(
                        "Background enrichment finished with {} failed steps",
                        report.failed_steps().count()
                    );
                }
            }
        })
    }
}
