//! Content extraction.
//!
//! The pipeline talks to extractors through [`ContentExtractor`]; the HTTP
//! implementation lives in [`http_client`], and the HTML parsing it relies
//! on is in [`html`] so it can be exercised without a network.

pub mod html;
pub mod http_client;
mod snippet;
mod url_date;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

pub use http_client::HttpExtractor;
pub use snippet::{build_snippet, split_sentences};
pub use url_date::date_from_url;

/// How much of the article to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// Metadata plus a short keyword snippet, on a short timeout.
    #[default]
    Light,
    /// The whole article body, length-capped.
    Full,
}

impl ExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort article data returned by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedArticle {
    pub title: String,
    /// Snippet in light mode, capped body text in full mode.
    pub content: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub domain: String,
}

/// Fetches article data for a URL.
///
/// Implementations enforce their own per-mode timeout and report it as
/// [`ExtractError::Timeout`].
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str, mode: ExtractMode) -> Result<ExtractedArticle, ExtractError>;
}
