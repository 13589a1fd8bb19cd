use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use m3u::Attribute;
use serde::Deserialize;
use streamcheck_engine::{AcceptanceProfile, ProxyConfig, ValidatorConfig};
use tracing::{debug, info};

use crate::cli::{Args, Settings};
use crate::error::AppError;
use crate::utils::{apply_headers, parse_params};

/// Contents of the `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub profile: Option<AcceptanceProfile>,
    #[serde(flatten)]
    pub settings: Settings,
    /// Added to the built-in blocked domains.
    pub blocked_domains: Vec<String>,
    /// Extra default request headers.
    pub headers: BTreeMap<String, String>,
    pub proxy: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

impl Settings {
    /// Field-wise merge where `overrides` wins.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            max_concurrency: overrides.max_concurrency.or(self.max_concurrency),
            max_connections_per_host: overrides
                .max_connections_per_host
                .or(self.max_connections_per_host),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            connect_timeout_secs: overrides.connect_timeout_secs.or(self.connect_timeout_secs),
            retries: overrides.retries.or(self.retries),
            retry_delay_ms: overrides.retry_delay_ms.or(self.retry_delay_ms),
            warmup_bytes: overrides.warmup_bytes.or(self.warmup_bytes),
            sample_bytes: overrides.sample_bytes.or(self.sample_bytes),
            min_speed_kbps: overrides.min_speed_kbps.or(self.min_speed_kbps),
            max_ttfb_ms: overrides.max_ttfb_ms.or(self.max_ttfb_ms),
            max_depth: overrides.max_depth.or(self.max_depth),
            max_manifest_bytes: overrides.max_manifest_bytes.or(self.max_manifest_bytes),
            user_agent: overrides.user_agent.or(self.user_agent),
            annotation_key: overrides.annotation_key.or(self.annotation_key),
            annotation_value: overrides.annotation_value.or(self.annotation_value),
            danger_accept_invalid_certs: overrides
                .danger_accept_invalid_certs
                .or(self.danger_accept_invalid_certs),
            follow_redirects: overrides.follow_redirects.or(self.follow_redirects),
            use_system_proxy: overrides.use_system_proxy.or(self.use_system_proxy),
        }
    }

    pub fn apply(&self, config: &mut ValidatorConfig) {
        if let Some(v) = self.max_concurrency {
            config.max_concurrency = v;
        }
        if let Some(v) = self.max_connections_per_host {
            config.max_connections_per_host = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.retries {
            config.retry.max_attempts = v;
        }
        if let Some(v) = self.retry_delay_ms {
            config.retry.base_delay = Duration::from_millis(v);
            config.retry.max_delay = config.retry.max_delay.max(config.retry.base_delay);
        }
        if let Some(v) = self.warmup_bytes {
            config.sampling.warmup_bytes = v;
        }
        if let Some(v) = self.sample_bytes {
            config.sampling.sample_bytes = v;
        }
        if let Some(v) = self.min_speed_kbps {
            config.sampling.min_speed_kbps = v;
        }
        if let Some(v) = self.max_ttfb_ms {
            config.sampling.max_ttfb = Duration::from_millis(v);
        }
        if let Some(v) = self.max_depth {
            config.max_depth = v;
        }
        if let Some(v) = self.max_manifest_bytes {
            config.max_manifest_bytes = v;
        }
        if let Some(v) = &self.user_agent {
            config.user_agent = v.clone();
        }
        if self.annotation_key.is_some() || self.annotation_value.is_some() {
            config.annotation = Attribute::new(
                self.annotation_key
                    .clone()
                    .unwrap_or_else(|| config.annotation.key.clone()),
                self.annotation_value
                    .clone()
                    .unwrap_or_else(|| config.annotation.value.clone()),
            );
        }
        if let Some(v) = self.danger_accept_invalid_certs {
            config.danger_accept_invalid_certs = v;
        }
        if let Some(v) = self.follow_redirects {
            config.follow_redirects = v;
        }
        if let Some(v) = self.use_system_proxy {
            config.use_system_proxy = v;
        }
    }
}

/// Builds the validator configuration. Later sources win: built-in
/// defaults, then the profile, then the config file, then flags. Blocked
/// domains and headers accumulate across sources.
pub fn resolve_config(args: &Args) -> Result<ValidatorConfig, AppError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let profile = args.profile.or(file.profile).unwrap_or_default();
    let settings = file.settings.clone().merge(args.settings.clone());

    // Profiles derive values from the final timeout, yet explicit settings
    // still win over the profile.
    let mut config = ValidatorConfig::default();
    settings.apply(&mut config);
    profile.apply(&mut config);
    settings.apply(&mut config);

    config
        .blocked_domains
        .extend(file.blocked_domains.iter().chain(&args.block).cloned());

    apply_headers(&mut config.headers, file.headers.clone())?;
    apply_headers(&mut config.headers, parse_params(&args.headers)?)?;

    let proxy_url = args.proxy.clone().or(file.proxy.clone());
    if let Some(url) = proxy_url {
        let username = args.proxy_username.clone().or(file.proxy_username.clone());
        let password = args.proxy_password.clone().or(file.proxy_password.clone());
        let mut proxy = ProxyConfig::from_url(url);
        match (username, password) {
            (Some(username), Some(password)) => proxy = proxy.with_auth(username, password),
            (None, None) => {}
            _ => {
                return Err(AppError::InvalidInput(
                    "Proxy username and password must be given together".to_string(),
                ));
            }
        }
        config.proxy = Some(proxy);
    }

    info!(
        ?profile,
        max_concurrency = config.max_concurrency,
        min_speed_kbps = config.sampling.min_speed_kbps,
        max_ttfb_ms = config.sampling.max_ttfb.as_millis() as u64,
        blocked_domains = config.blocked_domains.len(),
        "Configuration resolved"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["streamcheck", "in.m3u", "out.m3u"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = resolve_config(&args(&[])).unwrap();
        assert_eq!(config.max_concurrency, 80);
        assert_eq!(config.sampling.min_speed_kbps, 250.0);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn file_values_apply_and_flags_override_them() {
        let file = write_config(
            r#"
            profile = "relaxed"
            max_concurrency = 20
            timeout_secs = 5
            max_ttfb_ms = 2500
            annotation_value = "Checked"
            blocked_domains = ["ads.example"]

            [headers]
            X-Client = "iptv"
            "#,
        );
        let path = file.path().to_str().unwrap();
        let config = resolve_config(&args(&[
            "--config",
            path,
            "--max-concurrency",
            "4",
            "--block",
            "spam.example",
        ]))
        .unwrap();

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.sampling.max_ttfb, Duration::from_millis(2500));
        assert_eq!(config.sampling.min_speed_kbps, 0.0);
        assert_eq!(config.annotation, Attribute::new("group-title", "Checked"));
        assert_eq!(config.headers.get("x-client").unwrap(), "iptv");
        let blocklist = config.blocklist();
        assert!(blocklist.is_blocked("http://amagi.tv/x"));
        assert!(blocklist.is_blocked("http://ads.example/x"));
        assert!(blocklist.is_blocked("http://spam.example/x"));
    }

    #[test]
    fn flag_profile_beats_file_profile() {
        let file = write_config("profile = \"relaxed\"\n");
        let config = resolve_config(&args(&[
            "--config",
            file.path().to_str().unwrap(),
            "--profile",
            "reachable",
        ]))
        .unwrap();
        assert_eq!(config.sampling.warmup_bytes, 0);
    }

    #[test]
    fn reachable_ttfb_follows_overridden_timeout() {
        let config =
            resolve_config(&args(&["--profile", "reachable", "--timeout-secs", "30"])).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.sampling.max_ttfb, Duration::from_secs(30));

        let file = write_config("profile = \"reachable\"\ntimeout_secs = 20\n");
        let config = resolve_config(&args(&[
            "--config",
            file.path().to_str().unwrap(),
            "--max-ttfb-ms",
            "1500",
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.sampling.max_ttfb, Duration::from_millis(1500));
        assert_eq!(config.sampling.warmup_bytes, 0);
    }

    #[test]
    fn explicit_setting_beats_profile_value() {
        let config =
            resolve_config(&args(&["--profile", "relaxed", "--min-speed-kbps", "100"])).unwrap();
        assert_eq!(config.sampling.min_speed_kbps, 100.0);
    }

    #[test]
    fn proxy_with_credentials() {
        let config = resolve_config(&args(&[
            "--proxy",
            "socks5://127.0.0.1:1080",
            "--proxy-username",
            "u",
            "--proxy-password",
            "p",
        ]))
        .unwrap();
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.proxy_type, streamcheck_engine::ProxyType::Socks5);
        assert_eq!(proxy.auth.unwrap().username, "u");

        let err = resolve_config(&args(&["--proxy", "http://p:1", "--proxy-username", "u"]));
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let file = write_config("max_concurrency = \"lots\"\n");
        let err = resolve_config(&args(&["--config", file.path().to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, AppError::ConfigParse { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let err = resolve_config(&args(&["--config", "/nonexistent/streamcheck.toml"])).unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }

    #[test]
    fn bad_header_flag_is_rejected() {
        let err = resolve_config(&args(&["-H", "no-separator"])).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
