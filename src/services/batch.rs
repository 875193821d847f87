//! Batch file parsing and manual record entry.
//!
//! Batch files hold one article per line: `url[\ttitle[\tdate[\tbrand]]]`.
//! Blank lines and `#` comments are skipped. A bad row is reported and the
//! remaining rows are still returned.

use crate::error::{Error, ValidationError};
use crate::models::{parse_date_input, BatchHints, Candidate, NewArticle};
use crate::repository::{DbContext, InsertOutcome};
use crate::utils::{extract_domain, is_valid_url};

/// Parsed rows and per-row rejections.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub candidates: Vec<Candidate>,
    pub errors: Vec<ValidationError>,
}

fn optional(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse one line; `row` is 1-based for error messages.
pub fn parse_batch_line(row: usize, line: &str) -> Result<Candidate, ValidationError> {
    let mut fields = line.split('\t');
    let url = fields.next().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(ValidationError::MissingUrl { row });
    }
    if !is_valid_url(url) {
        return Err(ValidationError::InvalidUrl {
            row,
            url: url.to_string(),
        });
    }

    Ok(Candidate {
        url: url.to_string(),
        hints: BatchHints {
            title: optional(fields.next()),
            publish_date: optional(fields.next()),
            brand: optional(fields.next()),
        },
    })
}

/// Parse a whole batch file.
pub fn parse_batch(text: &str) -> ParsedBatch {
    let mut parsed = ParsedBatch::default();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        match parse_batch_line(index + 1, line) {
            Ok(candidate) => parsed.candidates.push(candidate),
            Err(e) => parsed.errors.push(e),
        }
    }
    parsed
}

/// An article entered by hand rather than extracted.
#[derive(Debug, Clone, Default)]
pub struct ManualArticle {
    pub url: String,
    pub title: String,
    pub content: String,
    pub publish_date: Option<String>,
}

/// Validate and insert a hand-entered article. Content is mandatory.
pub async fn insert_manual(ctx: &DbContext, manual: ManualArticle) -> Result<InsertOutcome, Error> {
    if manual.url.trim().is_empty() {
        return Err(ValidationError::MissingUrl { row: 1 }.into());
    }
    if !is_valid_url(&manual.url) {
        return Err(ValidationError::InvalidUrl {
            row: 1,
            url: manual.url,
        }
        .into());
    }
    if manual.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent { row: 1 }.into());
    }

    let mut article = NewArticle::new(manual.url.trim());
    article.domain = extract_domain(&manual.url);
    article.title = manual.title;
    article.content = manual.content;
    article.text_scraped = true;
    if let Some(date) = manual.publish_date {
        article.publish_date = Some(parse_date_input(&date).ok_or(ValidationError::InvalidValue {
            field: "publish_date".into(),
            value: date,
        })?);
    }

    let outcome = ctx.articles().insert(&article).await?;
    if outcome.is_inserted() {
        ctx.domains().ensure(&article.domain, article.page_rank).await?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::articles::test_support::test_context;

    #[test]
    fn test_parse_batch_reports_bad_rows_and_continues() {
        let text = "https://a.com/1\tA title\t2024-01-02\tWidgetly\n\
                    \n\
                    # comment\n\
                    \tNo url here\n\
                    not a url\n\
                    b.com/2\n";
        let parsed = parse_batch(text);

        assert_eq!(parsed.candidates.len(), 2);
        let first = &parsed.candidates[0];
        assert_eq!(first.hints.title.as_deref(), Some("A title"));
        assert_eq!(first.hints.publish_date.as_deref(), Some("2024-01-02"));
        assert_eq!(first.hints.brand.as_deref(), Some("Widgetly"));
        assert!(parsed.candidates[1].hints.is_empty());

        assert_eq!(parsed.errors.len(), 2);
        assert!(matches!(parsed.errors[0], ValidationError::MissingUrl { row: 4 }));
        assert!(matches!(parsed.errors[1], ValidationError::InvalidUrl { row: 5, .. }));
    }

    #[tokio::test]
    async fn test_insert_manual_requires_content() {
        let (_dir, ctx) = test_context().await;
        let result = insert_manual(
            &ctx,
            ManualArticle {
                url: "https://a.com/1".into(),
                title: "Title".into(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::EmptyContent { .. }))
        ));

        let outcome = insert_manual(
            &ctx,
            ManualArticle {
                url: "https://a.com/1".into(),
                title: "Title".into(),
                content: "Body".into(),
                publish_date: Some("2024-02-01".into()),
            },
        )
        .await
        .unwrap();
        assert!(outcome.is_inserted());
        assert!(ctx.domains().get("a.com").await.unwrap().is_some());
    }
}
