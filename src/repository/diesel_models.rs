//! Diesel ORM models for database tables.
//!
//! These mirror the storage layout, including nullable enrichment columns.
//! Conversion into the domain models folds NULLs into type defaults.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::{format_datetime, parse_datetime};
use crate::models::{
    Article, ArticlePatch, BatchHints, DomainMetadata, QueueEntry, QueueStatus,
};
use crate::schema;

/// Article row from the database.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = schema::articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleRecord {
    pub row_key: i64,
    pub id: Option<i64>,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub title: String,
    pub content: String,
    pub publish_date: Option<String>,
    pub updated_at: String,
    pub inserted_at: String,
    pub country: Option<String>,
    pub language: Option<String>,
    pub tier: Option<String>,
    pub page_rank: Option<f64>,
    pub social_shares_count: Option<i64>,
    pub backlinks: Option<f64>,
    pub month: Option<String>,
    pub tagged_antler: Option<bool>,
    pub tagged_portco: Option<bool>,
    pub antler_in_headline: Option<bool>,
    pub unbranded_win: Option<bool>,
    pub matched_spokespeople: Option<String>,
    pub matched_reporter: Option<String>,
    pub matched_portcos: Option<String>,
    pub matched_vc_investors: Option<String>,
    pub matched_vehicle: Option<String>,
    pub matched_portco_location: Option<String>,
    pub matched_portco_deal_lead: Option<String>,
    pub managed_by_fund: Option<String>,
    pub kill_pill: Option<bool>,
    pub kill_pill_context: Option<String>,
    pub kill_pill_count: Option<i32>,
    pub unwanted: Option<bool>,
    pub unwanted_context: Option<String>,
    pub unwanted_count: Option<i32>,
    pub text_scraped: Option<bool>,
    pub text_scraped_at: Option<String>,
    pub text_scrape_error: Option<String>,
    pub data_ingestion: Option<bool>,
    pub is_complete: Option<bool>,
}

fn date_or_epoch(s: Option<String>) -> DateTime<Utc> {
    s.as_deref().map(parse_datetime).unwrap_or(DateTime::UNIX_EPOCH)
}

impl From<ArticleRecord> for Article {
    fn from(r: ArticleRecord) -> Self {
        Article {
            row_key: r.row_key,
            id: r.id,
            url: r.url,
            normalized_url: r.normalized_url,
            domain: r.domain,
            title: r.title,
            content: r.content,
            publish_date: date_or_epoch(r.publish_date),
            updated_at: parse_datetime(&r.updated_at),
            inserted_at: parse_datetime(&r.inserted_at),
            country: r.country.unwrap_or_default(),
            language: r.language.unwrap_or_default(),
            tier: r.tier.unwrap_or_default(),
            page_rank: r.page_rank.unwrap_or_default(),
            social_shares_count: r.social_shares_count.unwrap_or_default(),
            backlinks: r.backlinks.unwrap_or_default(),
            month: r.month.unwrap_or_default(),
            tagged_antler: r.tagged_antler.unwrap_or_default(),
            tagged_portco: r.tagged_portco.unwrap_or_default(),
            antler_in_headline: r.antler_in_headline.unwrap_or_default(),
            unbranded_win: r.unbranded_win.unwrap_or_default(),
            matched_spokespeople: r.matched_spokespeople.unwrap_or_default(),
            matched_reporter: r.matched_reporter.unwrap_or_default(),
            matched_portcos: r.matched_portcos.unwrap_or_default(),
            matched_vc_investors: r.matched_vc_investors.unwrap_or_default(),
            matched_vehicle: r.matched_vehicle.unwrap_or_default(),
            matched_portco_location: r.matched_portco_location.unwrap_or_default(),
            matched_portco_deal_lead: r.matched_portco_deal_lead.unwrap_or_default(),
            managed_by_fund: r.managed_by_fund.unwrap_or_default(),
            kill_pill: r.kill_pill.unwrap_or_default(),
            kill_pill_context: r.kill_pill_context.unwrap_or_default(),
            kill_pill_count: r.kill_pill_count.unwrap_or_default(),
            unwanted: r.unwanted.unwrap_or_default(),
            unwanted_context: r.unwanted_context.unwrap_or_default(),
            unwanted_count: r.unwanted_count.unwrap_or_default(),
            text_scraped: r.text_scraped.unwrap_or_default(),
            text_scraped_at: date_or_epoch(r.text_scraped_at),
            text_scrape_error: r.text_scrape_error.unwrap_or_default(),
            data_ingestion: r.data_ingestion.unwrap_or_default(),
            is_complete: r.is_complete.unwrap_or_default(),
        }
    }
}

/// New article for insertion.
///
/// Every enrichment column is written as `Some(default)`; inserts never
/// leave a NULL behind.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = schema::articles)]
pub struct NewArticleRecord {
    pub id: Option<i64>,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub title: String,
    pub content: String,
    pub publish_date: Option<String>,
    pub updated_at: String,
    pub inserted_at: String,
    pub country: Option<String>,
    pub language: Option<String>,
    pub tier: Option<String>,
    pub page_rank: Option<f64>,
    pub social_shares_count: Option<i64>,
    pub backlinks: Option<f64>,
    pub month: Option<String>,
    pub tagged_antler: Option<bool>,
    pub tagged_portco: Option<bool>,
    pub antler_in_headline: Option<bool>,
    pub unbranded_win: Option<bool>,
    pub matched_spokespeople: Option<String>,
    pub matched_reporter: Option<String>,
    pub matched_portcos: Option<String>,
    pub matched_vc_investors: Option<String>,
    pub matched_vehicle: Option<String>,
    pub matched_portco_location: Option<String>,
    pub matched_portco_deal_lead: Option<String>,
    pub managed_by_fund: Option<String>,
    pub kill_pill: Option<bool>,
    pub kill_pill_context: Option<String>,
    pub kill_pill_count: Option<i32>,
    pub unwanted: Option<bool>,
    pub unwanted_context: Option<String>,
    pub unwanted_count: Option<i32>,
    pub text_scraped: Option<bool>,
    pub text_scraped_at: Option<String>,
    pub text_scrape_error: Option<String>,
    pub data_ingestion: Option<bool>,
    pub is_complete: Option<bool>,
}

impl NewArticleRecord {
    /// A record with every enrichment column at its default.
    ///
    /// `month` stays empty here; it is derived by enrichment.
    pub fn with_defaults(url: &str, normalized_url: &str, now: DateTime<Utc>) -> Self {
        let now = format_datetime(now);
        let epoch = format_datetime(DateTime::UNIX_EPOCH);
        let empty = || Some(String::new());
        Self {
            id: None,
            url: url.to_string(),
            normalized_url: normalized_url.to_string(),
            domain: String::new(),
            title: String::new(),
            content: String::new(),
            publish_date: Some(epoch.clone()),
            updated_at: now.clone(),
            inserted_at: now,
            country: empty(),
            language: empty(),
            tier: empty(),
            page_rank: Some(0.0),
            social_shares_count: Some(0),
            backlinks: Some(0.0),
            month: empty(),
            tagged_antler: Some(false),
            tagged_portco: Some(false),
            antler_in_headline: Some(false),
            unbranded_win: Some(false),
            matched_spokespeople: empty(),
            matched_reporter: empty(),
            matched_portcos: empty(),
            matched_vc_investors: empty(),
            matched_vehicle: empty(),
            matched_portco_location: empty(),
            matched_portco_deal_lead: empty(),
            managed_by_fund: empty(),
            kill_pill: Some(false),
            kill_pill_context: empty(),
            kill_pill_count: Some(0),
            unwanted: Some(false),
            unwanted_context: empty(),
            unwanted_count: Some(0),
            text_scraped: Some(false),
            text_scraped_at: Some(epoch),
            text_scrape_error: empty(),
            data_ingestion: Some(false),
            is_complete: Some(false),
        }
    }
}

/// Partial article update. `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = schema::articles)]
pub struct ArticleChangeset {
    pub title: Option<String>,
    pub content: Option<String>,
    pub domain: Option<String>,
    pub publish_date: Option<String>,
    pub updated_at: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub tier: Option<String>,
    pub page_rank: Option<f64>,
    pub social_shares_count: Option<i64>,
    pub backlinks: Option<f64>,
    pub tagged_antler: Option<bool>,
    pub tagged_portco: Option<bool>,
    pub unbranded_win: Option<bool>,
    pub matched_spokespeople: Option<String>,
    pub matched_reporter: Option<String>,
    pub matched_portcos: Option<String>,
    pub matched_vc_investors: Option<String>,
    pub matched_vehicle: Option<String>,
    pub managed_by_fund: Option<String>,
}

impl ArticleChangeset {
    pub fn from_patch(patch: ArticlePatch, now: DateTime<Utc>) -> Self {
        Self {
            title: patch.title,
            content: patch.content,
            domain: patch.domain,
            publish_date: patch.publish_date.map(format_datetime),
            updated_at: Some(format_datetime(now)),
            country: patch.country,
            language: patch.language,
            tier: patch.tier,
            page_rank: patch.page_rank,
            social_shares_count: patch.social_shares_count,
            backlinks: patch.backlinks,
            tagged_antler: patch.tagged_antler,
            tagged_portco: patch.tagged_portco,
            unbranded_win: patch.unbranded_win,
            matched_spokespeople: patch.matched_spokespeople,
            matched_reporter: patch.matched_reporter,
            matched_portcos: patch.matched_portcos,
            matched_vc_investors: patch.matched_vc_investors,
            matched_vehicle: patch.matched_vehicle,
            managed_by_fund: patch.managed_by_fund,
        }
    }
}

/// Queue row from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::processing_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueRecord {
    pub id: String,
    pub url: String,
    pub status: String,
    pub batch_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: String,
    pub retry_count: i32,
    pub hint_title: Option<String>,
    pub hint_publish_date: Option<String>,
    pub hint_brand: Option<String>,
}

impl From<QueueRecord> for QueueEntry {
    fn from(r: QueueRecord) -> Self {
        QueueEntry {
            id: r.id,
            url: r.url,
            status: QueueStatus::from_str(&r.status).unwrap_or(QueueStatus::Pending),
            batch_name: r.batch_name,
            created_at: parse_datetime(&r.created_at),
            updated_at: parse_datetime(&r.updated_at),
            error_message: r.error_message,
            retry_count: r.retry_count,
            hints: BatchHints {
                title: r.hint_title,
                publish_date: r.hint_publish_date,
                brand: r.hint_brand,
            },
        }
    }
}

/// New queue entry for insertion.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = schema::processing_queue)]
pub struct NewQueueRecord {
    pub id: String,
    pub url: String,
    pub status: String,
    pub batch_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: String,
    pub retry_count: i32,
    pub hint_title: Option<String>,
    pub hint_publish_date: Option<String>,
    pub hint_brand: Option<String>,
}

/// Domain metadata row.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = schema::domains)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DomainRecord {
    pub domain: String,
    pub page_rank: f64,
    pub llm_rank: f64,
    pub hn_citation: f64,
    pub signal_score: f64,
    pub tier: String,
    pub country: String,
    pub created_at: String,
}

impl From<DomainRecord> for DomainMetadata {
    fn from(r: DomainRecord) -> Self {
        DomainMetadata {
            domain: r.domain,
            page_rank: r.page_rank,
            llm_rank: r.llm_rank,
            hn_citation: r.hn_citation,
            signal_score: r.signal_score,
            tier: r.tier,
            country: r.country,
            created_at: parse_datetime(&r.created_at),
        }
    }
}

impl From<&DomainMetadata> for DomainRecord {
    fn from(m: &DomainMetadata) -> Self {
        DomainRecord {
            domain: m.domain.clone(),
            page_rank: m.page_rank,
            llm_rank: m.llm_rank,
            hn_citation: m.hn_citation,
            signal_score: m.signal_score,
            tier: m.tier.clone(),
            country: m.country.clone(),
            created_at: format_datetime(m.created_at),
        }
    }
}
