use std::time::Duration;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use url::Url;

use crate::error::ProbeError;

/// Why an entry was dropped from the output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RejectReason {
    /// URL matched the domain blocklist. A policy decision, not a fault.
    BlockedDomain,
    /// Error status, transport failure or empty body.
    HttpError,
    /// Manifest nesting went past the configured depth.
    DepthExceeded,
    /// Manifest body did not have the expected structure.
    MalformedManifest,
    /// Stream was measured but was too slow or took too long to start.
    BelowThreshold,
    /// No complete answer within the request budget.
    Timeout,
}

/// Result of a successful throughput sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// The leaf URL that was actually measured (direct stream or segment).
    pub url: Url,
    pub ttfb: Duration,
    pub rate_kbps: f64,
    pub measured_bytes: u64,
}

impl Measurement {
    pub fn ttfb_seconds(&self) -> f64 {
        self.ttfb.as_secs_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// The entry URL the resolution started from.
    pub url: String,
    /// Human-readable cause, for diagnostics only.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationVerdict {
    Accepted(Measurement),
    Rejected(Rejection),
}

impl ValidationVerdict {
    pub fn rejected(reason: RejectReason, url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Rejected(Rejection {
            reason,
            url: url.into(),
            detail: detail.into(),
        })
    }

    pub fn from_error(err: &ProbeError, url: impl Into<String>) -> Self {
        Self::rejected(err.reject_reason(), url, err.to_string())
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection.reason),
        }
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Self::Accepted(measurement) => Some(measurement),
            Self::Rejected(_) => None,
        }
    }
}
