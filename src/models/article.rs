//! Article record model.
//!
//! Every field has a canonical "unset" value (empty string, `false`, zero,
//! or the epoch for timestamps). Storage NULLs are folded into these
//! defaults when rows are read, so callers never see a null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Fields an article needs before it counts as complete.
pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "url",
    "domain",
    "title",
    "content",
    "publish_date",
    "country",
    "language",
    "tier",
    "month",
];

/// A stored media article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Storage key; stable even when `id` is missing or duplicated.
    pub row_key: i64,
    /// Legacy numeric identity, assigned as `max(id) + 1` at insert time.
    pub id: Option<i64>,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub title: String,
    pub content: String,
    /// Epoch when unknown.
    pub publish_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
    pub country: String,
    pub language: String,
    pub tier: String,
    pub page_rank: f64,
    pub social_shares_count: i64,
    pub backlinks: f64,
    /// First day of the publication month, `YYYY-MM-01`.
    pub month: String,
    pub tagged_antler: bool,
    pub tagged_portco: bool,
    pub antler_in_headline: bool,
    pub unbranded_win: bool,
    pub matched_spokespeople: String,
    pub matched_reporter: String,
    pub matched_portcos: String,
    pub matched_vc_investors: String,
    pub matched_vehicle: String,
    pub matched_portco_location: String,
    pub matched_portco_deal_lead: String,
    pub managed_by_fund: String,
    pub kill_pill: bool,
    pub kill_pill_context: String,
    pub kill_pill_count: i32,
    pub unwanted: bool,
    pub unwanted_context: String,
    pub unwanted_count: i32,
    pub text_scraped: bool,
    pub text_scraped_at: DateTime<Utc>,
    pub text_scrape_error: String,
    pub data_ingestion: bool,
    pub is_complete: bool,
}

impl Article {
    /// Number of fields holding a non-default value.
    ///
    /// Storage bookkeeping (`row_key`, the url pair, insert and update
    /// timestamps) is excluded since every row has it.
    pub fn filled_field_count(&self) -> usize {
        let strings = [
            &self.domain,
            &self.title,
            &self.content,
            &self.country,
            &self.language,
            &self.tier,
            &self.month,
            &self.matched_spokespeople,
            &self.matched_reporter,
            &self.matched_portcos,
            &self.matched_vc_investors,
            &self.matched_vehicle,
            &self.matched_portco_location,
            &self.matched_portco_deal_lead,
            &self.managed_by_fund,
            &self.kill_pill_context,
            &self.unwanted_context,
            &self.text_scrape_error,
        ];
        let flags = [
            self.tagged_antler,
            self.tagged_portco,
            self.antler_in_headline,
            self.unbranded_win,
            self.kill_pill,
            self.unwanted,
            self.text_scraped,
            self.data_ingestion,
            self.is_complete,
        ];

        strings.iter().filter(|s| !s.is_empty()).count()
            + flags.iter().filter(|b| **b).count()
            + usize::from(self.id.is_some())
            + usize::from(is_set(self.publish_date))
            + usize::from(is_set(self.text_scraped_at))
            + usize::from(self.page_rank != 0.0)
            + usize::from(self.backlinks != 0.0)
            + usize::from(self.social_shares_count != 0)
            + usize::from(self.kill_pill_count != 0)
            + usize::from(self.unwanted_count != 0)
    }

    /// Required fields that still hold their default value.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.has_field(field))
            .collect()
    }

    /// Whether every required field is filled.
    pub fn meets_completeness(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|field| self.has_field(field))
    }

    fn has_field(&self, field: &str) -> bool {
        match field {
            "id" => self.id.is_some(),
            "url" => !self.url.is_empty(),
            "domain" => !self.domain.is_empty(),
            "title" => !self.title.is_empty(),
            "content" => !self.content.is_empty(),
            "publish_date" => is_set(self.publish_date),
            "country" => !self.country.is_empty(),
            "language" => !self.language.is_empty(),
            "tier" => !self.tier.is_empty(),
            "month" => !self.month.is_empty(),
            _ => false,
        }
    }

    /// Most recent write to this row, insert or update.
    pub fn last_written(&self) -> DateTime<Utc> {
        self.updated_at.max(self.inserted_at)
    }
}

/// Whether a timestamp differs from the epoch sentinel.
pub fn is_set(dt: DateTime<Utc>) -> bool {
    dt != DateTime::UNIX_EPOCH
}

/// First day of the month containing `dt`, formatted `YYYY-MM-01`.
pub fn month_of(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-01").to_string()
}

/// Input for a new article insert.
///
/// Anything not set here is written as its type default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewArticle {
    pub url: String,
    /// Derived from the URL when empty.
    pub domain: String,
    pub title: String,
    pub content: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub page_rank: f64,
    pub social_shares_count: i64,
    pub matched_portcos: String,
    pub tagged_antler: bool,
    pub text_scraped: bool,
    pub data_ingestion: bool,
}

impl NewArticle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Partial update applied to one article.
///
/// `None` leaves a field untouched. Values equal to the field's default are
/// dropped by [`ArticlePatch::without_regressions`], so a patch can fill
/// or change a field but never blank it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub domain: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
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

impl ArticlePatch {
    /// Set a field from its textual name and value, as given on the command line.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        let invalid = || ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };
        let text = || Some(value.to_string());

        match field {
            "title" => self.title = text(),
            "content" => self.content = text(),
            "domain" => self.domain = text(),
            "country" => self.country = text(),
            "language" => self.language = text(),
            "tier" => self.tier = text(),
            "matched_spokespeople" => self.matched_spokespeople = text(),
            "matched_reporter" => self.matched_reporter = text(),
            "matched_portcos" => self.matched_portcos = text(),
            "matched_vc_investors" => self.matched_vc_investors = text(),
            "matched_vehicle" => self.matched_vehicle = text(),
            "managed_by_fund" => self.managed_by_fund = text(),
            "publish_date" => {
                self.publish_date = Some(parse_date_input(value).ok_or_else(invalid)?)
            }
            "page_rank" => self.page_rank = Some(value.parse().map_err(|_| invalid())?),
            "backlinks" => self.backlinks = Some(value.parse().map_err(|_| invalid())?),
            "social_shares_count" => {
                self.social_shares_count = Some(value.parse().map_err(|_| invalid())?)
            }
            "tagged_antler" => self.tagged_antler = Some(parse_bool(value).ok_or_else(invalid)?),
            "tagged_portco" => self.tagged_portco = Some(parse_bool(value).ok_or_else(invalid)?),
            "unbranded_win" => self.unbranded_win = Some(parse_bool(value).ok_or_else(invalid)?),
            other => return Err(ValidationError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Drop every value that would reset a field to its default.
    pub fn without_regressions(self) -> Self {
        fn keep_text(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }
        Self {
            title: keep_text(self.title),
            content: keep_text(self.content),
            domain: keep_text(self.domain),
            publish_date: self.publish_date.filter(|d| is_set(*d)),
            country: keep_text(self.country),
            language: keep_text(self.language),
            tier: keep_text(self.tier),
            page_rank: self.page_rank.filter(|v| *v != 0.0),
            social_shares_count: self.social_shares_count.filter(|v| *v != 0),
            backlinks: self.backlinks.filter(|v| *v != 0.0),
            tagged_antler: self.tagged_antler.filter(|v| *v),
            tagged_portco: self.tagged_portco.filter(|v| *v),
            unbranded_win: self.unbranded_win.filter(|v| *v),
            matched_spokespeople: keep_text(self.matched_spokespeople),
            matched_reporter: keep_text(self.matched_reporter),
            matched_portcos: keep_text(self.matched_portcos),
            matched_vc_investors: keep_text(self.matched_vc_investors),
            matched_vehicle: keep_text(self.matched_vehicle),
            managed_by_fund: keep_text(self.managed_by_fund),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a user-supplied date: RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`.
pub fn parse_date_input(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    let date_part = s.get(..10).unwrap_or(s);
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn blank() -> Article {
        Article {
            row_key: 1,
            id: None,
            url: "https://a.com/1".into(),
            normalized_url: "https://a.com/1".into(),
            domain: String::new(),
            title: String::new(),
            content: String::new(),
            publish_date: DateTime::UNIX_EPOCH,
            updated_at: DateTime::UNIX_EPOCH,
            inserted_at: DateTime::UNIX_EPOCH,
            country: String::new(),
            language: String::new(),
            tier: String::new(),
            page_rank: 0.0,
            social_shares_count: 0,
            backlinks: 0.0,
            month: String::new(),
            tagged_antler: false,
            tagged_portco: false,
            antler_in_headline: false,
            unbranded_win: false,
            matched_spokespeople: String::new(),
            matched_reporter: String::new(),
            matched_portcos: String::new(),
            matched_vc_investors: String::new(),
            matched_vehicle: String::new(),
            matched_portco_location: String::new(),
            matched_portco_deal_lead: String::new(),
            managed_by_fund: String::new(),
            kill_pill: false,
            kill_pill_context: String::new(),
            kill_pill_count: 0,
            unwanted: false,
            unwanted_context: String::new(),
            unwanted_count: 0,
            text_scraped: false,
            text_scraped_at: DateTime::UNIX_EPOCH,
            text_scrape_error: String::new(),
            data_ingestion: false,
            is_complete: false,
        }
    }

    #[test]
    fn test_filled_field_count() {
        let mut article = blank();
        assert_eq!(article.filled_field_count(), 0);

        article.id = Some(7);
        article.title = "Hello".into();
        article.page_rank = 4.5;
        article.tagged_antler = true;
        assert_eq!(article.filled_field_count(), 4);
    }

    #[test]
    fn test_missing_required_fields() {
        let mut article = blank();
        assert!(article.missing_required_fields().contains(&"title"));
        assert!(!article.missing_required_fields().contains(&"url"));

        article.id = Some(1);
        article.domain = "a.com".into();
        article.title = "t".into();
        article.content = "c".into();
        article.publish_date = Utc::now();
        article.country = "US".into();
        article.language = "en".into();
        article.tier = "Tier 1".into();
        article.month = "2024-01-01".into();
        assert!(article.meets_completeness());
        assert!(article.missing_required_fields().is_empty());
    }

    #[test]
    fn test_month_of() {
        let dt = DateTime::parse_from_rfc3339("2024-03-17T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(month_of(dt), "2024-03-01");
    }

    #[test]
    fn test_patch_set_and_regressions() {
        let mut patch = ArticlePatch::default();
        patch.set("title", "New title").unwrap();
        patch.set("country", "").unwrap();
        patch.set("tagged_antler", "false").unwrap();
        patch.set("page_rank", "6.5").unwrap();
        assert!(patch.set("nonexistent", "x").is_err());
        assert!(patch.set("page_rank", "high").is_err());

        let patch = patch.without_regressions();
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.country, None);
        assert_eq!(patch.tagged_antler, None);
        assert_eq!(patch.page_rank, Some(6.5));
        assert!(!patch.is_empty());
        assert!(ArticlePatch::default().without_regressions().is_empty());
    }

    #[test]
    fn test_parse_date_input() {
        assert!(parse_date_input("2024-05-01").is_some());
        assert!(parse_date_input("2024-05-01 12:30:00").is_some());
        assert!(parse_date_input("2024-05-01T12:30:00+02:00").is_some());
        assert!(parse_date_input("yesterday").is_none());
        assert!(parse_date_input("").is_none());
    }
}
