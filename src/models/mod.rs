//! Data models for the ingestion pipeline.

mod article;
mod domain;
mod queue;

pub use article::{
    is_set, month_of, parse_date_input, Article, ArticlePatch, NewArticle, REQUIRED_FIELDS,
};
pub use domain::{country_from_tld, fallback_tier, page_rank_bucket, DomainMetadata};
pub use queue::{BatchHints, Candidate, EnqueueReport, QueueEntry, QueueStatus, StatusCounts};
