//! Repository utilities.

use diesel::result::DatabaseErrorInformation;

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Escape `%`, `_` and `\` so user text matches literally inside a LIKE pattern.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Turn a user pattern into a LIKE pattern.
///
/// `*` acts as a wildcard; with no `*` the pattern matches as a substring.
pub fn like_pattern(pattern: &str) -> String {
    if pattern.contains('*') {
        pattern
            .split('*')
            .map(escape_like)
            .collect::<Vec<_>>()
            .join("%")
    } else {
        format!("%{}%", escape_like(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_diesel_error_keeps_message() {
        let err = to_diesel_error("database is locked");
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("example.com"), "%example.com%");
        assert_eq!(like_pattern("https://a.com/*"), "https://a.com/%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }
}
