//! HLS manifest detection and the minimal classification the resolver needs:
//! only the first variant of a master playlist and the first segment of a
//! media playlist are ever looked at.

use tracing::trace;
use url::Url;

use crate::error::ProbeError;
use crate::headers::RequestHeaders;
use crate::transport::StreamTransport;

pub const MANIFEST_HEADER: &str = "#EXTM3U";
pub const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";
pub const MANIFEST_EXTENSION: &str = ".m3u8";

pub const HLS_CONTENT_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

const BOM: char = '\u{feff}';

/// Where a manifest points next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestTarget {
    /// First variant of a master playlist; resolved one level deeper.
    Variant(Url),
    /// First segment of a media playlist; sampled at the current depth.
    Segment(Url),
}

/// True when the URL path ends in `.m3u8`, ignoring case. Query and
/// fragment are not part of the path.
pub fn is_manifest_url(url: &Url) -> bool {
    let path = url.path();
    path.len() >= MANIFEST_EXTENSION.len()
        && path.is_char_boundary(path.len() - MANIFEST_EXTENSION.len())
        && path[path.len() - MANIFEST_EXTENSION.len()..].eq_ignore_ascii_case(MANIFEST_EXTENSION)
}

/// True for the HLS MIME types; parameters such as `charset` are ignored.
pub fn is_manifest_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    HLS_CONTENT_TYPES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(mime))
}

/// Classifies a manifest body fetched from `base`.
///
/// A body with any `#EXT-X-STREAM-INF` tag is a master playlist; anything
/// else is a media playlist.
pub fn classify(body: &str, base: &Url) -> Result<ManifestTarget, ProbeError> {
    let body = body.strip_prefix(BOM).unwrap_or(body);
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(first) if first.starts_with(MANIFEST_HEADER) => {}
        _ => {
            return Err(ProbeError::malformed(
                base.as_str(),
                "first line is not #EXTM3U",
            ));
        }
    }

    let lines: Vec<&str> = lines.collect();

    if let Some(pos) = lines.iter().position(|l| l.starts_with(STREAM_INF_TAG)) {
        return match lines.get(pos + 1) {
            Some(uri) if !uri.starts_with('#') => {
                let variant = join(base, uri)?;
                trace!(manifest = %base, variant = %variant, "Master playlist");
                Ok(ManifestTarget::Variant(variant))
            }
            _ => Err(ProbeError::malformed(
                base.as_str(),
                "#EXT-X-STREAM-INF is not followed by a variant URI",
            )),
        };
    }

    match lines.iter().find(|l| !l.starts_with('#')) {
        Some(uri) => {
            let segment = join(base, uri)?;
            trace!(manifest = %base, segment = %segment, "Media playlist");
            Ok(ManifestTarget::Segment(segment))
        }
        None => Err(ProbeError::malformed(
            base.as_str(),
            "media playlist has no segments",
        )),
    }
}

fn join(base: &Url, reference: &str) -> Result<Url, ProbeError> {
    base.join(reference)
        .map_err(|e| ProbeError::invalid_url(reference, e.to_string()))
}

/// One non-streaming manifest read. The caller bounds it with the request
/// timeout.
pub async fn fetch_manifest(
    transport: &dyn StreamTransport,
    url: &Url,
    headers: &RequestHeaders,
    max_bytes: usize,
) -> Result<String, ProbeError> {
    let response = transport.get(url, headers).await?;
    if response.status.as_u16() >= 400 {
        return Err(ProbeError::http_status(
            response.status,
            url.as_str(),
            "manifest fetch",
        ));
    }
    let body = response.read_text(url, max_bytes).await?;
    if body.trim().is_empty() {
        return Err(ProbeError::EmptyBody {
            url: url.to_string(),
        });
    }
    Ok(body)
}
