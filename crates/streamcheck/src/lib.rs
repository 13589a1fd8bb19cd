//! Stream validation engine for IPTV playlists.
//!
//! Each entry is resolved through nested HLS manifests down to a media URL,
//! which is then sampled for time to first byte and sustained rate. Entries
//! run concurrently under a global cap and a per-host connection cap.

pub mod aggregator;
pub mod blocklist;
pub mod client;
pub mod config;
pub mod error;
pub mod governor;
pub mod headers;
pub mod manifest;
pub mod proxy;
pub mod resolver;
pub mod retry;
pub mod sampler;
pub mod transport;
pub mod verdict;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregatedRun, ResultAggregator, RunSummary};
pub use blocklist::{DEFAULT_BLOCKED_DOMAINS, DomainBlocklist};
pub use client::create_client;
pub use config::{AcceptanceProfile, SamplingConfig, ValidatorConfig};
pub use error::ProbeError;
pub use governor::{StreamValidator, ValidatedEntry};
pub use headers::RequestHeaders;
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use resolver::{ManifestResolver, ResolutionState};
pub use retry::RetryPolicy;
pub use sampler::{SampleOutcome, ThroughputSampler};
pub use transport::{HttpTransport, StreamTransport, TransportResponse};
pub use verdict::{Measurement, RejectReason, Rejection, ValidationVerdict};
