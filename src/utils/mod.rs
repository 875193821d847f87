//! Shared utility functions.
//!
//! - `url`: URL canonicalization and domain extraction
//! - `text`: Bounded truncation and keyword matching

mod text;
mod url;

pub use self::text::{contains_any, find_term_context, truncate_chars};
pub use self::url::{extract_domain, is_blocked, is_valid_url, normalize_url};
