//! URL canonicalization.
//!
//! The normalized form is the identity key for deduplication, so every
//! step here must be idempotent: `normalize_url(normalize_url(x)) ==
//! normalize_url(x)` for any input.

const CANONICAL_SCHEME: &str = "https://";

/// Canonicalize a raw URL for identity comparison.
///
/// - Surrounding whitespace and leading slashes are dropped.
/// - `http://` and scheme-less inputs become `https://`.
/// - The host is lowercased and any leading `www.` labels are removed.
/// - Trailing slashes are removed unless only the scheme would remain.
///
/// Query strings and fragments are kept as-is, so `?utm=` variants remain
/// distinct identities.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }

    let rest = strip_scheme(trimmed);
    let rest = rest.trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    if rest.is_empty() {
        return CANONICAL_SCHEME.to_string();
    }

    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (host, tail) = rest.split_at(host_end);
    let host = strip_www(&host.to_lowercase());

    format!("{CANONICAL_SCHEME}{host}{tail}")
}

fn strip_scheme(s: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if s.len() >= scheme.len() && s[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return &s[scheme.len()..];
        }
    }
    s
}

fn strip_www(host: &str) -> String {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        if rest.is_empty() {
            break;
        }
        host = rest;
    }
    host.to_string()
}

/// Domain of a URL: lowercase host with `www.` stripped.
///
/// Returns an empty string when no host can be determined.
pub fn extract_domain(raw: &str) -> String {
    let normalized = normalize_url(raw);
    match url::Url::parse(&normalized) {
        Ok(parsed) => parsed.host_str().map(strip_www).unwrap_or_default(),
        Err(_) => normalized
            .strip_prefix(CANONICAL_SCHEME)
            .and_then(|rest| rest.split(['/', '?', '#']).next())
            .map(strip_www)
            .unwrap_or_default(),
    }
}

/// Whether a URL's domain equals or is a subdomain of any blocked domain.
pub fn is_blocked(raw: &str, blocked_domains: &[String]) -> bool {
    let domain = extract_domain(raw);
    if domain.is_empty() {
        return false;
    }
    blocked_domains.iter().any(|blocked| {
        let blocked = blocked.trim().to_lowercase();
        !blocked.is_empty()
            && (domain == blocked || domain.ends_with(&format!(".{}", blocked)))
    })
}

/// Whether the string parses as an absolute http(s) URL with a host.
pub fn is_valid_url(raw: &str) -> bool {
    let normalized = normalize_url(raw);
    url::Url::parse(&normalized)
        .map(|u| u.host_str().is_some_and(|h| h.contains('.')))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: &[&str] = &[
        "example.com/a",
        "example.com/a/",
        "/example.com/a",
        "//example.com/a//",
        "www.example.com/a",
        "http://www.Example.com/a/",
        "HTTPS://WWW.EXAMPLE.COM/Path/",
        "https://www.www.example.com",
        "  https://example.com/a?utm=1/  ",
        "https://example.com/a /",
        "https://",
        "/",
        "",
        "https://example.com/#frag",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        for shape in SHAPES {
            let once = normalize_url(shape);
            assert_eq!(normalize_url(&once), once, "not idempotent for {:?}", shape);
        }
    }

    #[test]
    fn test_normalize_variants_collapse() {
        let expected = "https://example.com/a";
        for shape in [
            "example.com/a",
            "example.com/a/",
            "/example.com/a",
            "www.example.com/a",
            "http://Example.com/a/",
            "https://www.example.com/a",
        ] {
            assert_eq!(normalize_url(shape), expected, "{:?}", shape);
        }
    }

    #[test]
    fn test_normalize_keeps_path_case_and_query() {
        assert_eq!(
            normalize_url("https://Example.com/Path?utm=X"),
            "https://example.com/Path?utm=X"
        );
        assert_ne!(
            normalize_url("https://a.com/1?utm=x"),
            normalize_url("https://a.com/1")
        );
    }

    #[test]
    fn test_normalize_edge_cases() {
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("   "), "");
        assert_eq!(normalize_url("/"), "");
        assert_eq!(normalize_url("https://"), "https://");
        assert_eq!(normalize_url("https:///"), "https://");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.TechCrunch.com/2024/a"), "techcrunch.com");
        assert_eq!(extract_domain("news.bbc.co.uk/x"), "news.bbc.co.uk");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn test_is_blocked() {
        let blocked = vec!["antler.co".to_string()];
        assert!(is_blocked("https://antler.co/portfolio", &blocked));
        assert!(is_blocked("www.blog.antler.co/post", &blocked));
        assert!(!is_blocked("https://antler.com/x", &blocked));
        assert!(!is_blocked("https://news.com/antler.co", &blocked));
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("example.com/a"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }
}
