//! Publish date detection from article URL paths.
//!
//! News sites commonly embed the publication date in the path
//! (`/2024/03/15/slug`, `/news-20240315`). Used when the page itself
//! carries no date metadata.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;

#[derive(Clone, Copy)]
enum Layout {
    Ymd,
    YearMonth,
}

static URL_DATE_PATTERNS: LazyLock<Vec<(Regex, Layout)>> = LazyLock::new(|| {
    vec![
        // /2024/03/15/, 2024-03-15, 2024_03_15
        (
            Regex::new(r"(?:^|\D)(\d{4})[-_/](\d{2})[-_/](\d{2})(?:\D|$)").expect("valid regex"),
            Layout::Ymd,
        ),
        // 20240315 bounded by non-digits
        (
            Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:\D|$)").expect("valid regex"),
            Layout::Ymd,
        ),
        // /2024/03/ directory-style archives
        (
            Regex::new(r"/(\d{4})/(\d{2})/").expect("valid regex"),
            Layout::YearMonth,
        ),
    ]
});

/// Path and query of a URL, or the input itself if it has no scheme.
fn url_path(url: &str) -> &str {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or(url)
}

fn parse_captures(caps: &regex::Captures, layout: Layout) -> Option<NaiveDate> {
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = match layout {
        Layout::Ymd => caps.get(3)?.as_str().parse().ok()?,
        Layout::YearMonth => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Date embedded in a URL path, at midnight UTC.
///
/// Years outside 1990 through next year are ignored as likely ids.
pub fn date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let path = url_path(url);
    let max_year = Utc::now().year() + 1;

    URL_DATE_PATTERNS.iter().find_map(|(pattern, layout)| {
        pattern
            .captures_iter(path)
            .filter_map(|caps| parse_captures(&caps, *layout))
            .find(|date| (1990..=max_year).contains(&date.year()))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    })
}
