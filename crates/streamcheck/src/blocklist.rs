/// Domains that are rejected without being measured.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &["amagi.tv", "ssai2-ads.api.leiniao.com"];

/// Substring-based domain blocklist. Matching is ASCII case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainBlocklist {
    domains: Vec<String>,
}

impl DomainBlocklist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        domains.sort();
        domains.dedup();
        Self { domains }
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.matching(url).is_some()
    }

    /// The first blocked domain occurring in `url`.
    pub fn matching(&self, url: &str) -> Option<&str> {
        if self.domains.is_empty() {
            return None;
        }
        let url = url.to_ascii_lowercase();
        self.domains
            .iter()
            .find(|domain| url.contains(domain.as_str()))
            .map(String::as_str)
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
