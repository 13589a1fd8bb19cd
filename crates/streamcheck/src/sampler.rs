//! Streaming throughput sampler.
//!
//! Each attempt opens one GET, times the first body byte, skips a warmup
//! prefix and measures the rate of the bytes that follow, up to a fixed
//! sample size. Responses announcing an HLS content type are handed back
//! unmeasured so the resolver can descend without a second request.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::config::{SamplingConfig, ValidatorConfig};
use crate::error::ProbeError;
use crate::headers::RequestHeaders;
use crate::manifest::is_manifest_content_type;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::transport::{BodyStream, StreamTransport, with_timeout};
use crate::verdict::Measurement;

const MIN_WINDOW: Duration = Duration::from_millis(1);

/// What a sampling probe found at the URL.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Measured(Measurement),
    /// The response declared an HLS content type; this is its body.
    Manifest(String),
}

pub struct ThroughputSampler {
    transport: Arc<dyn StreamTransport>,
    sampling: SamplingConfig,
    retry: RetryPolicy,
    timeout: Duration,
    max_manifest_bytes: usize,
}

impl ThroughputSampler {
    pub fn new(transport: Arc<dyn StreamTransport>, config: &ValidatorConfig) -> Self {
        Self {
            transport,
            sampling: config.sampling.clone(),
            retry: config.retry.clone(),
            timeout: config.timeout,
            max_manifest_bytes: config.max_manifest_bytes,
        }
    }

    /// Measures `url`, which is known to be media.
    pub async fn sample(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<Measurement, ProbeError> {
        match self.probe(url, headers).await? {
            SampleOutcome::Measured(measurement) => Ok(measurement),
            SampleOutcome::Manifest(_) => Err(ProbeError::malformed(
                url.as_str(),
                "segment is itself a manifest",
            )),
        }
    }

    /// Measures `url` unless the response turns out to be a manifest.
    ///
    /// Retries every retryable failure up to the policy's attempt count;
    /// the last failure is returned once attempts run out.
    pub async fn probe(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<SampleOutcome, ProbeError> {
        retry_with_backoff(&self.retry, |attempt| async move {
            trace!(url = %url, attempt, "Sampling attempt");
            self.attempt(url, headers).await.into()
        })
        .await
    }

    async fn attempt(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<SampleOutcome, ProbeError> {
        let started = Instant::now();
        with_timeout(self.timeout, url, self.attempt_inner(url, headers, started)).await
    }

    async fn attempt_inner(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        started: Instant,
    ) -> Result<SampleOutcome, ProbeError> {
        let response = self.transport.get(url, headers).await?;
        if response.status.as_u16() >= 400 {
            return Err(ProbeError::http_status(response.status, url.as_str(), "sample"));
        }

        if response
            .content_type
            .as_deref()
            .is_some_and(is_manifest_content_type)
        {
            debug!(url = %url, "Response is an HLS manifest");
            let body = response.read_text(url, self.max_manifest_bytes).await?;
            if body.trim().is_empty() {
                return Err(ProbeError::EmptyBody {
                    url: url.to_string(),
                });
            }
            return Ok(SampleOutcome::Manifest(body));
        }

        let measurement = measure(url, response.body, started, &self.sampling).await?;
        Ok(SampleOutcome::Measured(measurement))
    }
}

/// Reads `body` and computes TTFB and the post-warmup rate in KiB/s.
///
/// Only bytes past `warmup_bytes` are counted. The measurement window opens
/// at the chunk that crosses the warmup threshold and closes at the last
/// chunk read, and is never shorter than one millisecond.
async fn measure(
    url: &Url,
    mut body: BodyStream,
    started: Instant,
    sampling: &SamplingConfig,
) -> Result<Measurement, ProbeError> {
    let warmup = sampling.warmup_bytes;
    let mut total: u64 = 0;
    let mut measured: u64 = 0;
    let mut ttfb: Option<Duration> = None;
    let mut window_start: Option<Instant> = None;
    let mut last_chunk = started;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        let now = Instant::now();

        if ttfb.is_none() {
            let first_byte = now.duration_since(started);
            if !sampling.max_ttfb.is_zero() && first_byte > sampling.max_ttfb {
                return Err(ProbeError::SlowFirstByte {
                    ttfb: first_byte,
                    limit: sampling.max_ttfb,
                });
            }
            ttfb = Some(first_byte);
        }

        let before = total;
        total += chunk.len() as u64;
        last_chunk = now;

        if total > warmup {
            window_start.get_or_insert(now);
            measured += total - before.max(warmup);
            if measured >= sampling.sample_bytes {
                break;
            }
        }
    }

    let (Some(ttfb), Some(window_start)) = (ttfb, window_start) else {
        return Err(ProbeError::WarmupNotReached {
            received: total,
            warmup,
        });
    };

    let window = last_chunk.duration_since(window_start).max(MIN_WINDOW);
    let rate_kbps = (measured as f64 / 1024.0) / window.as_secs_f64();

    debug!(
        url = %url,
        ttfb_ms = ttfb.as_millis() as u64,
        rate_kbps = %format!("{rate_kbps:.1}"),
        measured_bytes = measured,
        "Sample complete"
    );

    if rate_kbps < sampling.min_speed_kbps {
        return Err(ProbeError::BelowMinimumRate {
            rate_kbps,
            min_kbps: sampling.min_speed_kbps,
        });
    }

    Ok(Measurement {
        url: url.clone(),
        ttfb,
        rate_kbps,
        measured_bytes: measured,
    })
}
