use std::time::Duration;

use reqwest::StatusCode;

use crate::verdict::RejectReason;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("URL `{url}` matches blocked domain `{domain}`")]
    Blocked { url: String, domain: String },

    #[error("manifest nesting exceeded depth {max_depth} at {url}")]
    DepthExceeded { url: String, max_depth: u32 },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("operation timed out after {elapsed:?} for {url}")]
    Timeout { url: String, elapsed: Duration },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("malformed manifest at {url}: {reason}")]
    MalformedManifest { url: String, reason: String },

    #[error("stream ended after {received} bytes, before the {warmup}-byte warmup completed")]
    WarmupNotReached { received: u64, warmup: u64 },

    #[error("time to first byte {ttfb:?} exceeds {limit:?}")]
    SlowFirstByte { ttfb: Duration, limit: Duration },

    #[error("measured {rate_kbps:.1} kbps, below the {min_kbps:.1} kbps minimum")]
    BelowMinimumRate { rate_kbps: f64, min_kbps: f64 },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ProbeError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// The verdict reason this failure is reported under.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::Blocked { .. } => RejectReason::BlockedDomain,
            Self::DepthExceeded { .. } => RejectReason::DepthExceeded,
            Self::MalformedManifest { .. } => RejectReason::MalformedManifest,
            Self::Timeout { .. } => RejectReason::Timeout,
            Self::Network { source } if source.is_timeout() => RejectReason::Timeout,
            Self::WarmupNotReached { .. }
            | Self::SlowFirstByte { .. }
            | Self::BelowMinimumRate { .. } => RejectReason::BelowThreshold,
            Self::InvalidUrl { .. }
            | Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Transport { .. }
            | Self::EmptyBody { .. }
            | Self::ProxyConfiguration { .. }
            | Self::Configuration { .. } => RejectReason::HttpError,
        }
    }

    /// Whether another sampling attempt could change the outcome.
    ///
    /// Network, status and threshold failures are retried uniformly; policy
    /// and structural failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl { .. }
            | Self::Blocked { .. }
            | Self::DepthExceeded { .. }
            | Self::MalformedManifest { .. }
            | Self::ProxyConfiguration { .. }
            | Self::Configuration { .. } => false,
            Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::EmptyBody { .. }
            | Self::WarmupNotReached { .. }
            | Self::SlowFirstByte { .. }
            | Self::BelowMinimumRate { .. } => true,
        }
    }
}
