//! HTTP article extractor.

mod user_agent;

pub use user_agent::{resolve_user_agent, BROWSER_USER_AGENT, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::html::ArticlePage;
use super::snippet::build_snippet;
use super::url_date::date_from_url;
use super::{ContentExtractor, ExtractMode, ExtractedArticle};
use crate::config::Settings;
use crate::error::ExtractError;
use crate::utils::{extract_domain, is_valid_url, normalize_url, truncate_chars};

/// Full-mode bodies shorter than this are treated as failed extractions.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Length of a title synthesized from the snippet when the page has none.
const SNIPPET_TITLE_CHARS: usize = 100;

/// Fetches article pages over HTTP and extracts metadata and text.
#[derive(Clone)]
pub struct HttpExtractor {
    client: Client,
    light_timeout: Duration,
    full_timeout: Duration,
    max_content_length: usize,
    snippet_keywords: Vec<String>,
}

impl HttpExtractor {
    /// Build an extractor from settings. `snippet_keywords` select the
    /// sentences kept in light mode.
    pub fn new(settings: &Settings, snippet_keywords: Vec<String>) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(&settings.user_agent))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ExtractError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            light_timeout: settings.light_timeout,
            full_timeout: settings.full_timeout,
            max_content_length: settings.max_content_length,
            snippet_keywords,
        })
    }

    fn timeout_for(&self, mode: ExtractMode) -> Duration {
        match mode {
            ExtractMode::Light => self.light_timeout,
            ExtractMode::Full => self.full_timeout,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ExtractError::EmptyBody);
        }
        Ok(body)
    }

    /// Turn a fetched page into an article for the given mode.
    pub fn parse(
        &self,
        url: &str,
        html: &str,
        mode: ExtractMode,
    ) -> Result<ExtractedArticle, ExtractError> {
        let page = ArticlePage::parse(html);
        let mut title = page.title();
        let publish_date = page.publish_date().or_else(|| date_from_url(url));
        let body = page.body_text();

        let content = match mode {
            ExtractMode::Light => build_snippet(&body, &self.snippet_keywords),
            ExtractMode::Full => {
                let length = body.chars().count();
                if length < MIN_CONTENT_CHARS {
                    return Err(ExtractError::TooShort(length));
                }
                truncate_chars(&body, self.max_content_length)
            }
        };

        if title.is_empty() && !content.is_empty() {
            title = if content.chars().count() > SNIPPET_TITLE_CHARS {
                format!("{}...", truncate_chars(&content, SNIPPET_TITLE_CHARS))
            } else {
                content.clone()
            };
        }

        Ok(ExtractedArticle {
            title,
            content,
            publish_date,
            domain: extract_domain(url),
        })
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str, mode: ExtractMode) -> Result<ExtractedArticle, ExtractError> {
        if !is_valid_url(url) {
            return Err(ExtractError::InvalidUrl(url.to_string()));
        }
        let url = normalize_url(url);
        let timeout = self.timeout_for(mode);

        let html = match tokio::time::timeout(timeout, self.fetch(&url)).await {
            Ok(result) => result?,
            Err(_) => return Err(ExtractError::Timeout(timeout)),
        };
        debug!(bytes = html.len(), "Fetched article page");

        self.parse(&url, &html, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HttpExtractor {
        let mut settings = Settings::default();
        settings.max_content_length = 80;
        HttpExtractor::new(&settings, vec!["antler".to_string()]).unwrap()
    }

    const PAGE: &str = r#"
        <html><head><meta name="date" content="2024-02-03"></head>
        <body><article>
          <p>Investors gathered in Singapore for the annual demo day event.</p>
          <p>Antler backed four of the presenting companies this year. Others raised later.</p>
        </article></body></html>"#;

    #[test]
    fn test_light_mode_returns_snippet() {
        let article = extractor()
            .parse("https://www.news.com/a", PAGE, ExtractMode::Light)
            .unwrap();
        assert!(article.content.contains("Antler backed four"));
        assert_eq!(article.domain, "news.com");
        assert_eq!(
            article.publish_date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-02-03"
        );
        // No title tag, so one is derived from the snippet.
        assert!(article.title.ends_with("..."));
    }

    #[test]
    fn test_full_mode_caps_content() {
        let article = extractor()
            .parse("https://news.com/a", PAGE, ExtractMode::Full)
            .unwrap();
        assert_eq!(article.content.chars().count(), 80);
    }

    #[test]
    fn test_publish_date_falls_back_to_url() {
        let page = PAGE.replace(r#"<meta name="date" content="2024-02-03">"#, "");
        let article = extractor()
            .parse("https://news.com/2023/10/09/demo-day", &page, ExtractMode::Light)
            .unwrap();
        assert_eq!(
            article.publish_date.unwrap().format("%Y-%m-%d").to_string(),
            "2023-10-09"
        );
    }

    #[test]
    fn test_full_mode_rejects_short_pages() {
        let result = extractor().parse(
            "https://news.com/a",
            "<p>Too short to be an article body.</p>",
            ExtractMode::Full,
        );
        assert!(matches!(result, Err(ExtractError::TooShort(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_fetching() {
        let result = extractor().extract("not a url", ExtractMode::Light).await;
        assert!(matches!(result, Err(ExtractError::InvalidUrl(_))));
    }
}
