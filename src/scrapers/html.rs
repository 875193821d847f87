//! Article metadata and body text from HTML.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::models::parse_date_input;

const TITLE_SELECTORS: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
    "h1",
    "title",
];

const DATE_META_SELECTORS: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="publishdate"]"#,
    r#"meta[itemprop="datePublished"]"#,
    r#"meta[name="date"]"#,
];

/// Containers tried in order for body paragraphs.
const BODY_SELECTORS: &[&str] = &["article p", "main p", "p"];

/// Paragraphs shorter than this are treated as chrome (captions, bylines).
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Parsed view of an article page.
pub struct ArticlePage {
    document: Html,
}

impl ArticlePage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Best available headline.
    pub fn title(&self) -> String {
        for selector in TITLE_SELECTORS {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            for element in self.document.select(&selector) {
                let value = match element.value().attr("content") {
                    Some(content) => collapse_whitespace(content),
                    None => element_text(&element),
                };
                if !value.is_empty() {
                    return value;
                }
            }
        }
        String::new()
    }

    /// Publication date from meta tags, `<time datetime>`, or JSON-LD.
    pub fn publish_date(&self) -> Option<DateTime<Utc>> {
        for selector in DATE_META_SELECTORS {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            let found = self
                .document
                .select(&selector)
                .filter_map(|e| e.value().attr("content"))
                .find_map(parse_date_input);
            if found.is_some() {
                return found;
            }
        }

        if let Ok(selector) = Selector::parse("time[datetime]") {
            let found = self
                .document
                .select(&selector)
                .filter_map(|e| e.value().attr("datetime"))
                .find_map(parse_date_input);
            if found.is_some() {
                return found;
            }
        }

        self.json_ld_date()
    }

    fn json_ld_date(&self) -> Option<DateTime<Utc>> {
        let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
        self.document.select(&selector).find_map(|script| {
            let raw: String = script.text().collect();
            let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
            find_date_published(&value)
        })
    }

    /// Body text: paragraphs of the first container that yields any,
    /// separated by blank lines.
    pub fn body_text(&self) -> String {
        for selector in BODY_SELECTORS {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            let paragraphs: Vec<String> = self
                .document
                .select(&selector)
                .map(|p| element_text(&p))
                .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
                .collect();
            if !paragraphs.is_empty() {
                return paragraphs.join("\n\n");
            }
        }
        String::new()
    }
}

fn find_date_published(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(date) = map.get("datePublished").and_then(|d| d.as_str()) {
                if let Some(parsed) = parse_date_input(date) {
                    return Some(parsed);
                }
            }
            map.get("@graph").and_then(find_date_published)
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_date_published),
        _ => None,
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
