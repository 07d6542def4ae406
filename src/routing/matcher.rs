//! Host matching for routers.
//!
//! # Responsibilities
//! - Decide whether a router may claim a request for a given Host
//! - Support exact hosts, host lists and host regexes
//!
//! # Design Decisions
//! - Exact and list matching is case-insensitive, as hostnames are
//! - Regex matching runs against the lower-cased host
//! - An unrestricted filter accepts requests without a Host header

use regex::Regex;

/// Host filter attached to a router.
#[derive(Debug, Clone, Default)]
pub enum DomainFilter {
    #[default]
    Any,
    Exact(String),
    List(Vec<String>),
    Pattern(Regex),
}

impl DomainFilter {
    /// Create an exact host filter.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn exact(host: impl Into<String>) -> Self {
        DomainFilter::Exact(host.into().to_lowercase())
    }

    pub fn list<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DomainFilter::List(hosts.into_iter().map(|h| h.into().to_lowercase()).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(DomainFilter::Pattern(Regex::new(pattern)?))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, DomainFilter::Any)
    }

    /// Returns true if a request for `host` passes this filter.
    pub fn accepts(&self, host: Option<&str>) -> bool {
        if self.is_any() {
            return true;
        }
        let Some(host) = host else {
            return false;
        };
        let host = host.to_lowercase();
        match self {
            DomainFilter::Any => true,
            DomainFilter::Exact(expected) => *expected == host,
            DomainFilter::List(hosts) => hosts.iter().any(|h| *h == host),
            DomainFilter::Pattern(regex) => regex.is_match(&host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_host() {
        let filter = DomainFilter::exact("example.com");
        assert!(filter.accepts(Some("example.com")));
        assert!(filter.accepts(Some("EXAMPLE.COM"))); // Case insensitive
        assert!(!filter.accepts(Some("other.com")));
        assert!(!filter.accepts(None));
    }

    #[test]
    fn test_host_list() {
        let filter = DomainFilter::list(["a.test", "B.test"]);
        assert!(filter.accepts(Some("b.test")));
        assert!(!filter.accepts(Some("c.test")));
    }

    #[test]
    fn test_host_pattern() {
        let filter = DomainFilter::pattern(r"^[a-z]+\.example\.com$").unwrap();
        assert!(filter.accepts(Some("api.example.com")));
        assert!(!filter.accepts(Some("example.com")));
    }

    #[test]
    fn test_any_accepts_missing_host() {
        assert!(DomainFilter::Any.accepts(None));
    }
}
