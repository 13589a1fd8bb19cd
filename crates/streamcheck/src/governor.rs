//! Bounded-parallel validation of a whole playlist.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use m3u::StreamEntry;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::ValidatorConfig;
use crate::error::ProbeError;
use crate::headers::RequestHeaders;
use crate::resolver::ManifestResolver;
use crate::transport::{HttpTransport, StreamTransport};
use crate::verdict::ValidationVerdict;

/// One input entry together with its verdict.
#[derive(Debug, Clone)]
pub struct ValidatedEntry {
    /// Position of the entry in the input.
    pub index: usize,
    pub entry: StreamEntry,
    pub verdict: ValidationVerdict,
}

pub struct StreamValidator {
    resolver: ManifestResolver,
    fallback_headers: RequestHeaders,
    max_concurrency: usize,
}

impl StreamValidator {
    pub fn new(transport: Arc<dyn StreamTransport>, config: &ValidatorConfig) -> Self {
        Self {
            resolver: ManifestResolver::new(transport, config),
            fallback_headers: RequestHeaders::default(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Validator over a `reqwest` transport built from `config`.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ProbeError> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Headers used for anything an entry's own directives leave unset.
    pub fn with_fallback_headers(mut self, headers: RequestHeaders) -> Self {
        self.fallback_headers = headers;
        self
    }

    pub async fn validate(&self, index: usize, entry: StreamEntry) -> ValidatedEntry {
        let headers =
            RequestHeaders::from_directives(&entry.directive_lines[..]).or(&self.fallback_headers);
        let verdict = self.resolver.resolve(&entry.url, &headers).await;
        ValidatedEntry {
            index,
            entry,
            verdict,
        }
    }

    /// Validates every entry, at most `max_concurrency` at a time, and
    /// yields one result per entry in completion order.
    pub fn validate_all(self: Arc<Self>, entries: Vec<StreamEntry>) -> ReceiverStream<ValidatedEntry> {
        let (tx, rx) = mpsc::channel(self.max_concurrency);

        tokio::spawn(async move {
            let total = entries.len();
            info!(entries = total, max_concurrency = self.max_concurrency, "Starting validation");

            let mut pending = entries.into_iter().enumerate();
            let mut in_flight = FuturesUnordered::new();
            let mut completed = 0usize;

            loop {
                while in_flight.len() < self.max_concurrency {
                    match pending.next() {
                        Some((index, entry)) => in_flight.push(self.validate(index, entry)),
                        None => break,
                    }
                }

                let Some(result) = in_flight.next().await else {
                    break;
                };
                completed += 1;
                if tx.send(result).await.is_err() {
                    debug!(completed, total, "Result receiver dropped, stopping validation");
                    return;
                }
            }

            debug!(completed, total, "All validations finished");
        });

        ReceiverStream::new(rx)
    }
}
