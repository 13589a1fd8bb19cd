//! In-memory transport with scripted responses and virtual-time pacing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use crate::error::ProbeError;
use crate::headers::RequestHeaders;
use crate::transport::{StreamTransport, TransportResponse};

#[derive(Debug, Clone)]
pub enum Route {
    Body {
        status: u16,
        content_type: Option<String>,
        chunks: Vec<Bytes>,
        /// Delay before the first chunk.
        first: Duration,
        /// Delay between later chunks.
        interval: Duration,
    },
    Error(String),
    /// Never answers.
    Hang,
}

impl Route {
    pub fn text(body: &str) -> Self {
        Route::Body {
            status: 200,
            content_type: None,
            chunks: vec![Bytes::copy_from_slice(body.as_bytes())],
            first: Duration::ZERO,
            interval: Duration::ZERO,
        }
    }

    pub fn manifest(body: &str) -> Self {
        Self::text(body).with_content_type("application/vnd.apple.mpegurl")
    }

    pub fn paced(chunk_size: usize, count: usize, first: Duration, interval: Duration) -> Self {
        Route::Body {
            status: 200,
            content_type: Some("video/mp2t".to_string()),
            chunks: vec![Bytes::from(vec![0u8; chunk_size]); count],
            first,
            interval,
        }
    }

    pub fn status(status: u16) -> Self {
        Route::Body {
            status,
            content_type: None,
            chunks: Vec::new(),
            first: Duration::ZERO,
            interval: Duration::ZERO,
        }
    }

    pub fn with_content_type(mut self, value: &str) -> Self {
        if let Route::Body { content_type, .. } = &mut self {
            *content_type = Some(value.to_string());
        }
        self
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<(String, RequestHeaders)>>,
    in_flight: Arc<AtomicUsize>,
    peak: AtomicUsize,
    open_delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request waits `delay` before its response headers arrive.
    pub fn with_open_delay(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::default()
        }
    }

    pub fn route(&self, url: &str, route: Route) {
        self.routes.lock().insert(url.to_string(), route);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|(u, _)| u == url).count()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn headers_for(&self, url: &str) -> Option<RequestHeaders> {
        self.requests
            .lock()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
    }

    /// Most requests that were open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self.in_flight.clone())
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse, ProbeError> {
        let guard = self.enter();
        self.requests
            .lock()
            .push((url.to_string(), headers.clone()));
        let route = self
            .routes
            .lock()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Route::status(404));

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        match route {
            Route::Error(reason) => Err(ProbeError::transport(reason)),
            Route::Hang => std::future::pending().await,
            Route::Body {
                status,
                content_type,
                chunks,
                first,
                interval,
            } => {
                let body = stream::unfold(
                    (chunks.into_iter(), true, guard),
                    move |(mut chunks, is_first, guard)| async move {
                        let chunk = chunks.next()?;
                        tokio::time::sleep(if is_first { first } else { interval }).await;
                        Some((Ok(chunk), (chunks, false, guard)))
                    },
                )
                .boxed();
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
                Ok(TransportResponse::new(status, content_type, body))
            }
        }
    }
}
