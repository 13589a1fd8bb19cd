use std::time::Duration;

use m3u::Attribute;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::blocklist::{DEFAULT_BLOCKED_DOMAINS, DomainBlocklist};
use crate::proxy::ProxyConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Throughput acceptance thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Leading bytes excluded from the rate measurement.
    pub warmup_bytes: u64,
    /// Measurement stops once this many bytes past the warmup have been read.
    pub sample_bytes: u64,
    /// Minimum accepted rate, in KiB per second.
    pub min_speed_kbps: f64,
    /// Maximum accepted time to first byte. Zero disables the check.
    pub max_ttfb: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            warmup_bytes: 32_000,
            sample_bytes: 384_000,
            min_speed_kbps: 250.0,
            max_ttfb: Duration::from_secs(4),
        }
    }
}

/// Named threshold presets. They only change configuration values; the
/// sampling code path is the same for all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum AcceptanceProfile {
    /// Rate and TTFB thresholds enforced.
    #[default]
    Strict,
    /// Any stream that gets past the warmup within the TTFB limit.
    Relaxed,
    /// Any stream that delivers a single byte before the request timeout.
    Reachable,
}

impl AcceptanceProfile {
    pub fn apply(self, config: &mut ValidatorConfig) {
        match self {
            AcceptanceProfile::Strict => {}
            AcceptanceProfile::Relaxed => {
                config.sampling.min_speed_kbps = 0.0;
            }
            AcceptanceProfile::Reachable => {
                config.sampling.min_speed_kbps = 0.0;
                config.sampling.warmup_bytes = 0;
                config.sampling.max_ttfb = config.timeout;
            }
        }
    }
}

/// Configurable options for the validator
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum validations in flight at once
    pub max_concurrency: usize,

    /// Maximum open connections to a single host
    pub max_connections_per_host: usize,

    /// Overall timeout for each request, including reading the body.
    /// Zero disables it.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Retry policy for throughput sampling
    pub retry: RetryPolicy,

    pub sampling: SamplingConfig,

    /// Manifest bodies larger than this are rejected as malformed
    pub max_manifest_bytes: usize,

    /// Deepest manifest nesting level that is still followed (root is 0)
    pub max_depth: u32,

    pub blocked_domains: Vec<String>,

    /// User agent sent when an entry does not set its own
    pub user_agent: String,

    /// Extra default headers for every request
    pub headers: HeaderMap,

    /// Attribute added to the `#EXTINF` line of accepted entries
    pub annotation: Attribute,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Skip TLS certificate verification. IPTV origins frequently serve
    /// self-signed or expired certificates.
    pub danger_accept_invalid_certs: bool,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 80,
            max_connections_per_host: 15,
            timeout: Duration::from_secs(12),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            sampling: SamplingConfig::default(),
            max_manifest_bytes: 2 * 1024 * 1024,
            max_depth: 3,
            blocked_domains: DEFAULT_BLOCKED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: ValidatorConfig::get_default_headers(),
            annotation: Attribute::new("group-title", "Fast"),
            proxy: None,
            use_system_proxy: true,
            danger_accept_invalid_certs: true,
            follow_redirects: true,
        }
    }
}

impl ValidatorConfig {
    pub fn with_profile(profile: AcceptanceProfile) -> Self {
        let mut config = Self::default();
        profile.apply(&mut config);
        config
    }

    pub fn blocklist(&self) -> DomainBlocklist {
        DomainBlocklist::new(&self.blocked_domains)
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}
