//! Batched membership checks against the record store.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::repository::ArticleRepository;
use crate::utils::normalize_url;

/// Outcome of [`check_existing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    /// Original inputs whose normalized form is already stored.
    pub existing: BTreeSet<String>,
    /// Original inputs whose batch query failed; their status is unknown.
    pub unknown: BTreeSet<String>,
    /// One message per failed batch.
    pub errors: Vec<String>,
}

impl DedupReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Which of `urls` are already in the store, reported as the original
/// strings.
///
/// Inputs are normalized and de-duplicated, then queried `batch_size` at a
/// time. Inputs that share a normalized form are all reported when it
/// matches. A failed batch is reported as `unknown` rather than dropped.
pub async fn check_existing(
    articles: &ArticleRepository,
    urls: &[String],
    batch_size: usize,
) -> DedupReport {
    let mut originals: HashMap<String, Vec<&String>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for url in urls {
        let normalized = normalize_url(url);
        if normalized.is_empty() {
            continue;
        }
        let entry = originals.entry(normalized.clone()).or_default();
        if entry.is_empty() {
            order.push(normalized);
        }
        entry.push(url);
    }

    let mut report = DedupReport::default();
    for chunk in order.chunks(batch_size.max(1)) {
        match articles.existing_normalized(chunk).await {
            Ok(found) => {
                for normalized in found {
                    if let Some(inputs) = originals.get(&normalized) {
                        report.existing.extend(inputs.iter().map(|s| s.to_string()));
                    }
                }
            }
            Err(e) => {
                warn!("Dedup batch of {} failed: {}", chunk.len(), e);
                for normalized in chunk {
                    if let Some(inputs) = originals.get(normalized) {
                        report.unknown.extend(inputs.iter().map(|s| s.to_string()));
                    }
                }
                report.errors.push(e.to_string());
            }
        }
    }
    report
}
