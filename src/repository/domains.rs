//! Domain metadata cache.

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use super::diesel_models::DomainRecord;
use super::pool::DbPool;
use crate::error::StoreError;
use crate::models::{country_from_tld, fallback_tier, page_rank_bucket, DomainMetadata};
use crate::schema::domains;
use crate::with_conn;

/// Repository for per-domain metadata.
#[derive(Clone)]
pub struct DomainRepository {
    pool: DbPool,
}

impl DomainRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, domain: &str) -> Result<Option<DomainMetadata>, StoreError> {
        with_conn!(self.pool, conn => {
            let record = domains::table
                .find(domain)
                .select(DomainRecord::as_select())
                .first::<DomainRecord>(&mut conn)
                .await
                .optional()?;
            Ok(record.map(DomainMetadata::from))
        })
    }

    pub async fn get_all(&self) -> Result<Vec<DomainMetadata>, StoreError> {
        with_conn!(self.pool, conn => {
            let records = domains::table
                .order(domains::domain.asc())
                .select(DomainRecord::as_select())
                .load::<DomainRecord>(&mut conn)
                .await?;
            Ok(records.into_iter().map(DomainMetadata::from).collect())
        })
    }

    /// Return the cached entry for `domain`, creating it on first sight.
    ///
    /// Derived scores come from domains in the same page-rank bucket; with
    /// no peers the fixed fallbacks apply. Existing entries are returned
    /// unchanged.
    pub async fn ensure(&self, domain: &str, page_rank: f64) -> Result<DomainMetadata, StoreError> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Err(StoreError::InvalidField("domain is empty".to_string()));
        }
        if let Some(existing) = self.get(&domain).await? {
            return Ok(existing);
        }

        let bucket = page_rank_bucket(page_rank) as f64;
        let peers: Vec<DomainMetadata> = with_conn!(self.pool, conn => {
            domains::table
                .filter(domains::page_rank.ge(bucket))
                .filter(domains::page_rank.lt(bucket + 1.0))
                .select(DomainRecord::as_select())
                .load::<DomainRecord>(&mut conn)
                .await?
                .into_iter()
                .map(DomainMetadata::from)
                .collect()
        });

        let metadata = derive_metadata(&domain, page_rank, &peers);
        let record = DomainRecord::from(&metadata);
        with_conn!(self.pool, conn => {
            diesel::insert_or_ignore_into(domains::table)
                .values(&record)
                .execute(&mut conn)
                .await?;
        });
        debug!(domain = %metadata.domain, tier = %metadata.tier, peers = peers.len(), "Created domain metadata");

        // A concurrent creator may have won; the stored row is authoritative.
        Ok(self.get(&domain).await?.unwrap_or(metadata))
    }
}

fn derive_metadata(domain: &str, page_rank: f64, peers: &[DomainMetadata]) -> DomainMetadata {
    let country = country_from_tld(domain).to_string();
    let created_at = Utc::now();

    if peers.is_empty() {
        return DomainMetadata {
            domain: domain.to_string(),
            page_rank,
            llm_rank: 0.0,
            hn_citation: 0.0,
            signal_score: page_rank / 10.0,
            tier: fallback_tier(page_rank).to_string(),
            country,
            created_at,
        };
    }

    let n = peers.len() as f64;
    let avg = |f: fn(&DomainMetadata) -> f64| peers.iter().map(f).sum::<f64>() / n;

    let mut tiers: HashMap<&str, usize> = HashMap::new();
    for peer in peers {
        *tiers.entry(peer.tier.as_str()).or_default() += 1;
    }
    // Ties resolve to the lexically smallest tier, i.e. the better one.
    let tier = tiers
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(tier, _)| tier.to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_tier(page_rank).to_string());

    DomainMetadata {
        domain: domain.to_string(),
        page_rank,
        llm_rank: avg(|d| d.llm_rank),
        hn_citation: avg(|d| d.hn_citation),
        signal_score: avg(|d| d.signal_score),
        tier,
        country,
        created_at,
    }
}
