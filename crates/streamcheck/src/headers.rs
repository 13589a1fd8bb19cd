use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use tracing::warn;

const VLC_OPTION_PREFIX: &str = "#EXTVLCOPT:";

/// Per-entry request header overrides.
///
/// Only the three headers players honour are modelled; anything left `None`
/// falls back to the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestHeaders {
    /// Maps `key=value` directive lines (optionally prefixed with
    /// `#EXTVLCOPT:`) onto headers. Keys are case-insensitive: `http-referrer`,
    /// `http-origin` and `http-user-agent` are recognised, the rest ignored.
    /// A later directive overrides an earlier one.
    pub fn from_directives<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut headers = Self::default();
        for line in lines {
            let line = line.as_ref().trim();
            let option = line.strip_prefix(VLC_OPTION_PREFIX).unwrap_or(line);
            let Some((key, value)) = option.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "http-referrer" => headers.referer = Some(value),
                "http-origin" => headers.origin = Some(value),
                "http-user-agent" => headers.user_agent = Some(value),
                _ => {}
            }
        }
        headers
    }

    /// Maps playlist-wide `#EXT-X-USER-AGENT:`, `#EXT-X-REFERER:` and
    /// `#EXT-X-ORIGIN:` lines onto headers.
    pub fn from_playlist_header<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut headers = Self::default();
        for line in lines {
            let line = line.as_ref().trim();
            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match tag.to_ascii_uppercase().as_str() {
                "#EXT-X-USER-AGENT" => headers.user_agent = Some(value),
                "#EXT-X-REFERER" => headers.referer = Some(value),
                "#EXT-X-ORIGIN" => headers.origin = Some(value),
                _ => {}
            }
        }
        headers
    }

    /// Fills every unset field from `fallback`.
    pub fn or(self, fallback: &RequestHeaders) -> Self {
        Self {
            referer: self.referer.or_else(|| fallback.referer.clone()),
            origin: self.origin.or_else(|| fallback.origin.clone()),
            user_agent: self.user_agent.or_else(|| fallback.user_agent.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.referer.is_none() && self.origin.is_none() && self.user_agent.is_none()
    }

    /// Builds the request header map. Values that are not valid header text
    /// are dropped with a warning.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        let fields = [
            (REFERER, &self.referer),
            (ORIGIN, &self.origin),
            (USER_AGENT, &self.user_agent),
        ];
        for (name, value) in fields {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.insert(name, value);
                }
                Err(e) => warn!(header = %name, error = %e, "Dropping invalid header value"),
            }
        }
        map
    }
}
