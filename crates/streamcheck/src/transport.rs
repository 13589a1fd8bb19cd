use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};
use url::Url;

use crate::client::create_client;
use crate::config::ValidatorConfig;
use crate::error::ProbeError;
use crate::headers::RequestHeaders;

pub type BodyStream = BoxStream<'static, Result<Bytes, ProbeError>>;

/// Runs one network operation under `limit`. A zero limit means no timeout,
/// the same as for the HTTP client.
pub async fn with_timeout<T, F>(
    limit: Duration,
    url: &Url,
    operation: F,
) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    if limit.is_zero() {
        return operation.await;
    }
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout {
            url: url.to_string(),
            elapsed: limit,
        }),
    }
}

/// An open response whose body has not been read yet.
pub struct TransportResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: BodyStream,
    // Held until the body is dropped so the per-host limit covers the read.
    _permit: Option<OwnedSemaphorePermit>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    pub fn new(status: StatusCode, content_type: Option<String>, body: BodyStream) -> Self {
        Self {
            status,
            content_type,
            body,
            _permit: None,
        }
    }

    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Reads the whole body as text, failing once more than `limit` bytes
    /// have arrived.
    pub async fn read_text(mut self, url: &Url, limit: usize) -> Result<String, ProbeError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            if buf.len() + chunk.len() > limit {
                return Err(ProbeError::malformed(
                    url.as_str(),
                    format!("manifest larger than {limit} bytes"),
                ));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Opens GET requests. The validator never talks to `reqwest` directly so
/// tests can script responses and timing.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse, ProbeError>;
}

/// Caps open connections per `host:port`.
#[derive(Debug)]
pub struct HostLimiter {
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, url: &Url) -> Arc<Semaphore> {
        let key = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        self.hosts
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone()
    }

    pub async fn acquire(&self, url: &Url) -> Result<OwnedSemaphorePermit, ProbeError> {
        self.semaphore(url)
            .acquire_owned()
            .await
            .map_err(|_| ProbeError::transport("host limiter closed"))
    }

    pub fn try_acquire(&self, url: &Url) -> Option<OwnedSemaphorePermit> {
        self.semaphore(url).try_acquire_owned().ok()
    }
}

/// `reqwest`-backed transport shared by every validation.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    limiter: Arc<HostLimiter>,
}

impl HttpTransport {
    pub fn new(client: Client, max_connections_per_host: usize) -> Self {
        Self {
            client,
            limiter: Arc::new(HostLimiter::new(max_connections_per_host)),
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ProbeError> {
        let client = create_client(config)?;
        Ok(Self::new(client, config.max_connections_per_host))
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse, ProbeError> {
        // Keyed on the requested host; redirect hops count against it too.
        let permit = self.limiter.acquire(url).await?;
        trace!(url = %url, "Opening request");

        let response = self
            .client
            .get(url.clone())
            .headers(headers.to_header_map())
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        debug!(url = %url, %status, content_type = ?content_type, "Response received");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProbeError::from))
            .boxed();

        Ok(TransportResponse::new(status, content_type, body).with_permit(permit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn host_limiter_caps_each_host_independently() {
        let limiter = HostLimiter::new(2);
        let a = Url::parse("http://a.example/1.ts").unwrap();
        let a_other_path = Url::parse("http://a.example:80/2.ts").unwrap();
        let b = Url::parse("http://b.example/1.ts").unwrap();

        let first = limiter.try_acquire(&a).unwrap();
        let _second = limiter.try_acquire(&a_other_path).unwrap();
        assert!(limiter.try_acquire(&a).is_none());
        assert!(limiter.try_acquire(&b).is_some());

        drop(first);
        assert!(limiter.try_acquire(&a).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_expires_unless_limit_is_zero() {
        let url = Url::parse("http://a.example/live.m3u8").unwrap();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ProbeError>(7)
        };

        let err = with_timeout(Duration::from_secs(12), &url, slow())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Timeout { elapsed, .. } if elapsed == Duration::from_secs(12)
        ));

        assert_eq!(with_timeout(Duration::ZERO, &url, slow()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn read_text_enforces_limit() {
        let url = Url::parse("http://x/a.m3u8").unwrap();
        let chunks = vec![
            Ok(Bytes::from_static(b"#EXTM3U\n")),
            Ok(Bytes::from_static(b"seg.ts\n")),
        ];
        let response = TransportResponse::new(StatusCode::OK, None, stream::iter(chunks).boxed());
        let err = response.read_text(&url, 10).await.unwrap_err();
        assert!(matches!(err, ProbeError::MalformedManifest { .. }));

        let chunks = vec![Ok(Bytes::from_static(b"#EXTM3U\n"))];
        let response = TransportResponse::new(StatusCode::OK, None, stream::iter(chunks).boxed());
        assert_eq!(response.read_text(&url, 10).await.unwrap(), "#EXTM3U\n");
    }
}
