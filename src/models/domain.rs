//! Per-domain reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached metadata for a publishing domain.
///
/// Created the first time a domain is seen and never re-verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainMetadata {
    /// Lowercase host with `www.` stripped.
    pub domain: String,
    pub page_rank: f64,
    pub llm_rank: f64,
    pub hn_citation: f64,
    pub signal_score: f64,
    pub tier: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

/// Tier used when no other domain shares the page-rank bucket.
pub fn fallback_tier(page_rank: f64) -> &'static str {
    if page_rank >= 7.0 {
        "Tier 1"
    } else if page_rank >= 5.0 {
        "Tier 2"
    } else if page_rank >= 3.0 {
        "Tier 3"
    } else {
        "Tier 4"
    }
}

/// Bucket index for correlating domains with similar page rank.
pub fn page_rank_bucket(page_rank: f64) -> i64 {
    page_rank.max(0.0).floor() as i64
}

/// Country code implied by a country-code TLD; empty for generic TLDs.
pub fn country_from_tld(domain: &str) -> &'static str {
    let tld = domain.rsplit('.').next().unwrap_or("");
    match tld {
        "uk" => "GB",
        "de" => "DE",
        "fr" => "FR",
        "es" => "ES",
        "it" => "IT",
        "nl" => "NL",
        "se" => "SE",
        "no" => "NO",
        "dk" => "DK",
        "fi" => "FI",
        "ie" => "IE",
        "ch" => "CH",
        "at" => "AT",
        "be" => "BE",
        "pt" => "PT",
        "pl" => "PL",
        "ca" => "CA",
        "au" => "AU",
        "nz" => "NZ",
        "in" => "IN",
        "sg" => "SG",
        "jp" => "JP",
        "kr" => "KR",
        "cn" => "CN",
        "hk" => "HK",
        "id" => "ID",
        "my" => "MY",
        "ph" => "PH",
        "vn" => "VN",
        "th" => "TH",
        "br" => "BR",
        "mx" => "MX",
        "ar" => "AR",
        "za" => "ZA",
        "ng" => "NG",
        "ke" => "KE",
        "ae" => "AE",
        "sa" => "SA",
        "il" => "IL",
        "us" => "US",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_tier() {
        assert_eq!(fallback_tier(8.2), "Tier 1");
        assert_eq!(fallback_tier(5.0), "Tier 2");
        assert_eq!(fallback_tier(3.9), "Tier 3");
        assert_eq!(fallback_tier(0.0), "Tier 4");
    }

    #[test]
    fn test_country_from_tld() {
        assert_eq!(country_from_tld("bbc.co.uk"), "GB");
        assert_eq!(country_from_tld("e27.sg"), "SG");
        assert_eq!(country_from_tld("techcrunch.com"), "");
    }

    #[test]
    fn test_page_rank_bucket() {
        assert_eq!(page_rank_bucket(5.7), 5);
        assert_eq!(page_rank_bucket(-1.0), 0);
    }
}
