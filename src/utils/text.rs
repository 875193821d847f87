//! Text helpers for bounded storage and keyword matching.

use regex::{Regex, RegexBuilder};

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Case-insensitive substring match against any keyword.
pub fn contains_any(text: &str, keywords: &[String]) -> bool {
    if text.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && haystack.contains(&k))
}

/// Characters of context kept on each side of the first match.
const CONTEXT_RADIUS: usize = 80;

/// Case-insensitive literal pattern for a term, or `None` if it is blank.
fn term_pattern(term: &str) -> Option<Regex> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Count case-insensitive occurrences of any term and capture context
/// around the first one.
///
/// Returns `None` when no term occurs.
pub fn find_term_context(content: &str, terms: &[String]) -> Option<(i32, String)> {
    if content.is_empty() {
        return None;
    }
    let mut count = 0i32;
    let mut first: Option<(usize, usize)> = None;

    for pattern in terms.iter().filter_map(|t| term_pattern(t)) {
        for found in pattern.find_iter(content) {
            count += 1;
            if first.map_or(true, |(start, _)| found.start() < start) {
                first = Some((found.start(), found.end()));
            }
        }
    }

    let (start, end) = first?;
    Some((count, context_window(content, start, end)))
}

/// Whitespace-collapsed text around `content[start..end]`.
///
/// Offsets come from matching on `content` itself, so they are char
/// boundaries.
fn context_window(content: &str, start: usize, end: usize) -> String {
    let skip = content[..start].chars().count().saturating_sub(CONTEXT_RADIUS);
    let match_chars = content[start..end].chars().count();
    let window: String = content
        .chars()
        .skip(skip)
        .take(match_chars + CONTEXT_RADIUS * 2)
        .collect();
    window.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_contains_any() {
        let kw = terms(&["Antler"]);
        assert!(contains_any("Antler backs a startup", &kw));
        assert!(contains_any("backed by ANTLER", &kw));
        assert!(!contains_any("nothing here", &kw));
        assert!(!contains_any("anything", &terms(&["", "  "])));
    }

    #[test]
    fn test_find_term_context() {
        let content = "The startup announced layoffs today. More layoffs are expected.";
        let (count, context) = find_term_context(content, &terms(&["layoffs"])).unwrap();
        assert_eq!(count, 2);
        assert!(context.contains("announced layoffs"));
        assert!(find_term_context(content, &terms(&["bankruptcy"])).is_none());
        assert!(find_term_context("", &terms(&["layoffs"])).is_none());
    }

    #[test]
    fn test_find_term_context_with_mixed_width_case_mappings() {
        // The ohm sign shrinks and dotted capital I grows when lowercased.
        let content = "\u{2126}layoffs \u{0130}";
        let (count, context) = find_term_context(content, &terms(&["layoffs"])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(context, content);

        let (count, context) =
            find_term_context("\u{0130}\u{0130} LAYOFFS at \u{2126}Corp", &terms(&["Layoffs"])).unwrap();
        assert_eq!(count, 1);
        assert!(context.contains("LAYOFFS"));
    }

    #[test]
    fn test_find_term_context_treats_terms_literally() {
        let (count, _) = find_term_context("cost (est.) rose", &terms(&["(est.)"])).unwrap();
        assert_eq!(count, 1);
        assert!(find_term_context("cost estimate", &terms(&["(est.)"])).is_none());
    }
}
