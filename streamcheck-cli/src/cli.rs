use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use streamcheck_engine::AcceptanceProfile;

/// Validate an IPTV playlist and keep only the streams that answer quickly
/// and sustain a minimum rate.
#[derive(Parser, Debug)]
#[command(name = "streamcheck", author, version, about, long_about = None)]
pub struct Args {
    /// Playlist to validate
    pub input: PathBuf,

    /// Where to write the accepted entries
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Acceptance threshold preset
    #[arg(long, value_enum)]
    pub profile: Option<AcceptanceProfile>,

    #[command(flatten)]
    pub settings: Settings,

    /// Extra blocked domain (repeatable)
    #[arg(long = "block", value_name = "DOMAIN")]
    pub block: Vec<String>,

    /// Extra default request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,

    /// Proxy URL (http://, https:// or socks5://)
    #[arg(long)]
    pub proxy: Option<String>,

    #[arg(long, requires = "proxy")]
    pub proxy_username: Option<String>,

    #[arg(long, requires = "proxy")]
    pub proxy_password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write daily-rotated log files to this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Tunables shared by the command line and the config file. Every field is
/// optional; unset fields keep the profile's value.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum entries validated at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Maximum open connections per host
    #[arg(long)]
    pub max_connections_per_host: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout_secs: Option<u64>,

    /// Sampling attempts per stream
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pause between sampling attempts in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Leading bytes excluded from the rate
    #[arg(long)]
    pub warmup_bytes: Option<u64>,

    /// Bytes measured after the warmup
    #[arg(long)]
    pub sample_bytes: Option<u64>,

    /// Minimum accepted rate in KiB/s
    #[arg(long)]
    pub min_speed_kbps: Option<f64>,

    /// Maximum accepted time to first byte in milliseconds
    #[arg(long, value_name = "MS")]
    pub max_ttfb_ms: Option<u64>,

    /// Deepest manifest nesting followed
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Largest manifest body accepted
    #[arg(long)]
    pub max_manifest_bytes: Option<usize>,

    /// Default User-Agent
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Attribute key added to accepted entries
    #[arg(long)]
    pub annotation_key: Option<String>,

    /// Attribute value added to accepted entries
    #[arg(long)]
    pub annotation_value: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, value_name = "BOOL")]
    pub danger_accept_invalid_certs: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub follow_redirects: Option<bool>,

    /// Honour system proxy settings when no proxy is given
    #[arg(long, value_name = "BOOL")]
    pub use_system_proxy: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_positionals_and_overrides() {
        let args = Args::try_parse_from([
            "streamcheck",
            "in.m3u",
            "out.m3u",
            "--profile",
            "relaxed",
            "--block",
            "ads.example",
            "--block",
            "spam.example",
            "-H",
            "X-Test=1",
            "--min-speed-kbps",
            "120.5",
            "--danger-accept-invalid-certs",
            "false",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.input, PathBuf::from("in.m3u"));
        assert_eq!(args.profile, Some(AcceptanceProfile::Relaxed));
        assert_eq!(args.block.len(), 2);
        assert_eq!(args.headers, vec!["X-Test=1".to_string()]);
        assert_eq!(args.settings.min_speed_kbps, Some(120.5));
        assert_eq!(args.settings.danger_accept_invalid_certs, Some(false));
        assert!(args.verbose);
    }

    #[test]
    fn output_is_required() {
        assert!(Args::try_parse_from(["streamcheck", "in.m3u"]).is_err());
    }

    #[test]
    fn proxy_credentials_need_a_proxy() {
        assert!(
            Args::try_parse_from(["streamcheck", "a", "b", "--proxy-username", "u"]).is_err()
        );
    }
}
