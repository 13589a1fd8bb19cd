use reqwest::Proxy;

use crate::error::ProbeError;

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy
    Socks5,
}

/// Proxy authentication type
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Outbound proxy used for every validation request.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Infers the proxy type from the URL scheme; anything unrecognised is HTTP.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let lower = url.to_ascii_lowercase();
        let proxy_type = if lower.starts_with("socks5://") || lower.starts_with("socks5h://") {
            ProxyType::Socks5
        } else if lower.starts_with("https://") {
            ProxyType::Https
        } else {
            ProxyType::Http
        };
        Self {
            url,
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, ProbeError> {
    let proxy_url = &config.url;
    let invalid = |e: reqwest::Error| ProbeError::ProxyConfiguration {
        reason: format!("invalid proxy URL `{proxy_url}`: {e}"),
    };

    // Validation requests go to both schemes, so the proxy applies to all traffic.
    let mut proxy = match config.proxy_type {
        ProxyType::Http | ProxyType::Https => Proxy::all(proxy_url).map_err(invalid)?,
        ProxyType::Socks5 => {
            let url = if proxy_url.starts_with("socks5://") || proxy_url.starts_with("socks5h://") {
                proxy_url.to_string()
            } else {
                format!("socks5://{proxy_url}")
            };
            Proxy::all(&url).map_err(invalid)?
        }
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
