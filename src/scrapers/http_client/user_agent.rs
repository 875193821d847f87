//! User agent handling for article requests.

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; mediatrack/0.1; +article-metadata)";

/// Desktop browser user agent for sites that refuse non-browser clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Resolve user agent from a config value.
/// - empty => default mediatrack user agent
/// - "browser" => desktop browser user agent
/// - other => used as-is
pub fn resolve_user_agent(config: &str) -> &str {
    match config.trim() {
        "" => USER_AGENT,
        "browser" => BROWSER_USER_AGENT,
        custom => custom,
    }
}
