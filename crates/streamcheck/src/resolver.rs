//! Resolves an entry URL down to something measurable.
//!
//! Resolution is a loop over [`ResolutionState`]: each master playlist moves
//! one level deeper, a media playlist or direct stream ends the loop in the
//! sampler. The depth bound is the only protection against manifest cycles.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::blocklist::DomainBlocklist;
use crate::config::ValidatorConfig;
use crate::error::ProbeError;
use crate::headers::RequestHeaders;
use crate::manifest::{ManifestTarget, classify, fetch_manifest, is_manifest_url};
use crate::sampler::{SampleOutcome, ThroughputSampler};
use crate::transport::{StreamTransport, with_timeout};
use crate::verdict::{Measurement, ValidationVerdict};

/// Position of one resolution step. Depth 0 is the entry URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    pub url: Url,
    pub depth: u32,
}

impl ResolutionState {
    pub fn root(url: Url) -> Self {
        Self { url, depth: 0 }
    }

    pub fn descend(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
        }
    }
}

pub struct ManifestResolver {
    transport: Arc<dyn StreamTransport>,
    sampler: ThroughputSampler,
    blocklist: DomainBlocklist,
    max_depth: u32,
    timeout: Duration,
    max_manifest_bytes: usize,
}

impl ManifestResolver {
    pub fn new(transport: Arc<dyn StreamTransport>, config: &ValidatorConfig) -> Self {
        Self {
            sampler: ThroughputSampler::new(transport.clone(), config),
            transport,
            blocklist: config.blocklist(),
            max_depth: config.max_depth,
            timeout: config.timeout,
            max_manifest_bytes: config.max_manifest_bytes,
        }
    }

    pub fn blocklist(&self) -> &DomainBlocklist {
        &self.blocklist
    }

    /// Never fails: every problem becomes a rejected verdict.
    pub async fn resolve(&self, url: &str, headers: &RequestHeaders) -> ValidationVerdict {
        match self.try_resolve(url, headers).await {
            Ok(measurement) => {
                debug!(
                    url,
                    leaf = %measurement.url,
                    ttfb_ms = measurement.ttfb.as_millis() as u64,
                    rate_kbps = %format!("{:.1}", measurement.rate_kbps),
                    "Stream accepted"
                );
                ValidationVerdict::Accepted(measurement)
            }
            Err(err) => {
                debug!(url, reason = %err.reject_reason(), error = %err, "Stream rejected");
                ValidationVerdict::from_error(&err, url)
            }
        }
    }

    async fn try_resolve(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<Measurement, ProbeError> {
        self.check_blocked(url)?;
        let url = Url::parse(url.trim()).map_err(|e| ProbeError::invalid_url(url, e.to_string()))?;
        let mut state = ResolutionState::root(url);

        loop {
            if state.depth > self.max_depth {
                return Err(ProbeError::DepthExceeded {
                    url: state.url.to_string(),
                    max_depth: self.max_depth,
                });
            }
            self.check_blocked(state.url.as_str())?;
            trace!(url = %state.url, depth = state.depth, "Resolving");

            let body = if is_manifest_url(&state.url) {
                self.fetch_manifest(&state.url, headers).await?
            } else {
                match self.sampler.probe(&state.url, headers).await? {
                    SampleOutcome::Measured(measurement) => return Ok(measurement),
                    SampleOutcome::Manifest(body) => body,
                }
            };

            match classify(&body, &state.url)? {
                ManifestTarget::Variant(variant) => {
                    debug!(
                        manifest = %state.url,
                        variant = %variant,
                        depth = state.depth + 1,
                        "Following first variant"
                    );
                    state = state.descend(variant);
                }
                ManifestTarget::Segment(segment) => {
                    self.check_blocked(segment.as_str())?;
                    debug!(manifest = %state.url, segment = %segment, depth = state.depth, "Sampling first segment");
                    return self.sampler.sample(&segment, headers).await;
                }
            }
        }
    }

    fn check_blocked(&self, url: &str) -> Result<(), ProbeError> {
        match self.blocklist.matching(url) {
            Some(domain) => Err(ProbeError::Blocked {
                url: url.to_string(),
                domain: domain.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn fetch_manifest(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<String, ProbeError> {
        let fetch = fetch_manifest(self.transport.as_ref(), url, headers, self.max_manifest_bytes);
        with_timeout(self.timeout, url, fetch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, ScriptedTransport};
    use crate::verdict::RejectReason;

    /// Roughly 800 KiB/s with a 100 ms first byte.
    fn fast() -> Route {
        Route::paced(8_192, 60, Duration::from_millis(100), Duration::from_millis(10))
    }

    fn resolver(transport: &Arc<ScriptedTransport>) -> ManifestResolver {
        ManifestResolver::new(transport.clone(), &ValidatorConfig::default())
    }

    fn reason(verdict: &ValidationVerdict) -> Option<RejectReason> {
        verdict.reason()
    }

    #[test]
    fn descend_increments_depth() {
        let root = ResolutionState::root(Url::parse("http://a/master.m3u8").unwrap());
        let next = root.descend(Url::parse("http://a/v.m3u8").unwrap());
        assert_eq!(root.depth, 0);
        assert_eq!(next.depth, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_entry_is_never_requested() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route("http://live.amagi.tv/a.ts", fast());
        let verdict = resolver(&transport)
            .resolve("http://live.amagi.tv/a.ts", &RequestHeaders::default())
            .await;
        assert_eq!(reason(&verdict), Some(RejectReason::BlockedDomain));
        assert!(transport.requested().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn chain_at_max_depth_is_sampled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route("http://h/m0.m3u8", Route::text("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nm1.m3u8\n"));
        transport.route("http://h/m1.m3u8", Route::text("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nm2.m3u8\n"));
        transport.route("http://h/m2.m3u8", Route::text("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nm3.m3u8\n"));
        transport.route("http://h/m3.m3u8", Route::text("#EXTM3U\n#EXTINF:6,\nseg.ts\n"));
        transport.route("http://h/seg.ts", fast());

        let verdict = resolver(&transport)
            .resolve("http://h/m0.m3u8", &RequestHeaders::default())
            .await;
        let measurement = verdict.measurement().expect("accepted");
        assert_eq!(measurement.url.as_str(), "http://h/seg.ts");
    }

    #[tokio::test(start_paused = true)]
    async fn chain_past_max_depth_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..4 {
            transport.route(
                &format!("http://h/m{i}.m3u8"),
                Route::text(&format!("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nm{}.m3u8\n", i + 1)),
            );
        }
        transport.route("http://h/m4.m3u8", Route::text("#EXTM3U\nseg.ts\n"));
        transport.route("http://h/seg.ts", fast());

        let verdict = resolver(&transport)
            .resolve("http://h/m0.m3u8", &RequestHeaders::default())
            .await;
        assert_eq!(reason(&verdict), Some(RejectReason::DepthExceeded));
        assert_eq!(transport.hits("http://h/m4.m3u8"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn self_referencing_manifest_hits_depth_bound() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            "http://h/loop.m3u8",
            Route::text("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nloop.m3u8\n"),
        );
        let verdict = resolver(&transport)
            .resolve("http://h/loop.m3u8", &RequestHeaders::default())
            .await;
        assert_eq!(reason(&verdict), Some(RejectReason::DepthExceeded));
        assert_eq!(transport.hits("http://h/loop.m3u8"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn only_first_variant_and_first_segment_are_fetched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            "http://h/master.m3u8",
            Route::text(
                "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nlow.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2\nhigh.m3u8\n",
            ),
        );
        transport.route(
            "http://h/low.m3u8",
            Route::text("#EXTM3U\n#EXTINF:6,\ns1.ts\n#EXTINF:6,\ns2.ts\n#EXTINF:6,\ns3.ts\n"),
        );
        transport.route("http://h/high.m3u8", Route::text("#EXTM3U\nx.ts\n"));
        transport.route("http://h/s1.ts", fast());
        transport.route("http://h/s2.ts", fast());
        transport.route("http://h/s3.ts", fast());

        let verdict = resolver(&transport)
            .resolve("http://h/master.m3u8", &RequestHeaders::default())
            .await;
        assert!(verdict.is_accepted());
        assert_eq!(
            transport.requested(),
            vec!["http://h/master.m3u8", "http://h/low.m3u8", "http://h/s1.ts"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_segment_is_not_sampled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            "http://h/media.m3u8",
            Route::text("#EXTM3U\nhttp://ssai2-ads.api.leiniao.com/ad.ts\n"),
        );
        let verdict = resolver(&transport)
            .resolve("http://h/media.m3u8", &RequestHeaders::default())
            .await;
        assert_eq!(reason(&verdict), Some(RejectReason::BlockedDomain));
        assert_eq!(transport.requested(), vec!["http://h/media.m3u8"]);
    }

    #[tokio::test(start_paused = true)]
    async fn manifest_detected_by_content_type_is_not_refetched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route("http://h/live", Route::manifest("#EXTM3U\nchunk.ts\n"));
        transport.route("http://h/chunk.ts", fast());

        let verdict = resolver(&transport)
            .resolve("http://h/live", &RequestHeaders::default())
            .await;
        assert!(verdict.is_accepted());
        assert_eq!(transport.hits("http://h/live"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manifest_failures_map_to_reasons() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route("http://h/missing.m3u8", Route::status(404));
        transport.route("http://h/html.m3u8", Route::text("<html></html>"));
        transport.route("http://h/empty.m3u8", Route::text("  \n"));
        transport.route("http://h/hang.m3u8", Route::Hang);
        transport.route("http://h/reset.m3u8", Route::Error("connection reset".into()));
        let resolver = resolver(&transport);
        let headers = RequestHeaders::default();

        let cases = [
            ("http://h/missing.m3u8", RejectReason::HttpError),
            ("http://h/html.m3u8", RejectReason::MalformedManifest),
            ("http://h/empty.m3u8", RejectReason::HttpError),
            ("http://h/hang.m3u8", RejectReason::Timeout),
            ("http://h/reset.m3u8", RejectReason::HttpError),
            ("not a url", RejectReason::HttpError),
        ];
        for (url, expected) in cases {
            let verdict = resolver.resolve(url, &headers).await;
            assert_eq!(reason(&verdict), Some(expected), "{url}");
        }
        // Manifest reads are not retried.
        assert_eq!(transport.hits("http://h/missing.m3u8"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_headers_reach_every_request() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route("http://h/media.m3u8", Route::text("#EXTM3U\nseg.ts\n"));
        transport.route("http://h/seg.ts", fast());
        let headers = RequestHeaders {
            referer: Some("https://site/".into()),
            ..RequestHeaders::default()
        };
        let verdict = resolver(&transport).resolve("http://h/media.m3u8", &headers).await;
        assert!(verdict.is_accepted());
        assert_eq!(transport.headers_for("http://h/media.m3u8"), Some(headers.clone()));
        assert_eq!(transport.headers_for("http://h/seg.ts"), Some(headers));
    }
}
