use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::metrics::{MetricError, MetricsSet};
use crate::provider::{Credentials, DEFAULT_API_URL, DEFAULT_GRAPHQL_URL, DEFAULT_QUERY_LIMIT};

/// Cloudflare accepts at most this many zone IDs in one `zoneTag_in` filter
pub const MAX_ZONE_BATCH: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either CF_API_TOKEN or both CF_API_KEY and CF_API_EMAIL must be set")]
    MissingCredentials,
    #[error("invalid listen address '{0}'")]
    InvalidListen(String),
    #[error("metrics path '{0}' collides with the health endpoint")]
    InvalidMetricsPath(String),
    #[error("REQUEST_PATHS must name at least one path pattern")]
    NoRequestPaths,
    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// Command-line flags; every flag can also be set through its environment variable
#[derive(Debug, Clone, Parser)]
#[command(name = "cloudflare-exporter")]
#[command(about = "Export Cloudflare zone analytics as Prometheus counters", long_about = None)]
pub struct Cli {
    /// Address to serve metrics on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Path under which metrics are exposed
    #[arg(long = "metrics_path", env = "METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// Cloudflare API token (takes precedence over key/email)
    #[arg(long = "cf_api_token", env = "CF_API_TOKEN", default_value = "", hide_env_values = true)]
    pub cf_api_token: String,

    /// Cloudflare global API key
    #[arg(long = "cf_api_key", env = "CF_API_KEY", default_value = "", hide_env_values = true)]
    pub cf_api_key: String,

    /// Cloudflare account email, used with the API key
    #[arg(long = "cf_api_email", env = "CF_API_EMAIL", default_value = "")]
    pub cf_api_email: String,

    /// Comma-separated zone IDs to export; all zones when empty
    #[arg(long = "cf_zones", env = "CF_ZONES", default_value = "")]
    pub cf_zones: String,

    /// Zones per analytics query
    #[arg(long = "cf_batch_size", env = "CF_BATCH_SIZE", default_value_t = MAX_ZONE_BATCH)]
    pub cf_batch_size: usize,

    /// Seconds to lag behind now, giving Cloudflare time to aggregate
    #[arg(long = "scrape_delay", env = "SCRAPE_DELAY", default_value_t = 300)]
    pub scrape_delay: u32,

    /// Seconds between scrape cycles
    #[arg(long = "scrape_interval", env = "SCRAPE_INTERVAL", default_value_t = 60)]
    pub scrape_interval: u64,

    /// Maximum records requested per zone and query
    #[arg(long = "query_limit", env = "QUERY_LIMIT", default_value_t = DEFAULT_QUERY_LIMIT)]
    pub query_limit: u32,

    /// Seconds before an analytics query is abandoned
    #[arg(long = "query_timeout", env = "QUERY_TIMEOUT", default_value_t = 30)]
    pub query_timeout: u64,

    /// Only free-tier zones are available; adaptive analytics are skipped
    #[arg(long = "free_tier", env = "FREE_TIER")]
    pub free_tier: bool,

    /// Comma-separated metric names not to export
    #[arg(long = "metrics_denylist", env = "METRICS_DENYLIST", default_value = "")]
    pub metrics_denylist: String,

    /// Comma-separated request path patterns (`_like` syntax, e.g. `/api/%`)
    #[arg(long = "request_paths", env = "REQUEST_PATHS", default_value = "/%")]
    pub request_paths: String,

    /// Comma-separated client hosts to include
    #[arg(long = "domain_names", env = "DOMAIN_NAMES", default_value = "")]
    pub domain_names: String,

    #[arg(long = "cf_api_url", env = "CF_API_URL", default_value = DEFAULT_API_URL, hide = true)]
    pub cf_api_url: String,

    #[arg(long = "cf_graphql_url", env = "CF_GRAPHQL_URL", default_value = DEFAULT_GRAPHQL_URL, hide = true)]
    pub cf_graphql_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub scrape: ScrapeConfig,
    pub denylist: MetricsSet,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub metrics_path: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub credentials: Credentials,
    pub api_url: String,
    pub graphql_url: String,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub zone_ids: Vec<String>,
    pub request_paths: Vec<String>,
    pub domain_names: Vec<String>,
    pub batch_size: usize,
    pub scrape_delay_secs: u32,
    pub interval: Duration,
    pub query_limit: u32,
    pub query_timeout: Duration,
    pub free_tier: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            zone_ids: Vec::new(),
            request_paths: vec!["/%".to_string()],
            domain_names: Vec::new(),
            batch_size: MAX_ZONE_BATCH,
            scrape_delay_secs: 300,
            interval: Duration::from_secs(60),
            query_limit: DEFAULT_QUERY_LIMIT,
            query_timeout: Duration::from_secs(30),
            free_tier: false,
        }
    }
}

/// Split a comma-separated flag value, trimming items and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let denylist = MetricsSet::denylist(split_list(&cli.metrics_denylist))?;

        let credentials = Credentials::select(&cli.cf_api_token, &cli.cf_api_key, &cli.cf_api_email)
            .ok_or(ConfigError::MissingCredentials)?;

        let listen = parse_listen(&cli.listen)?;

        let mut metrics_path = cli.metrics_path.trim().to_string();
        if !metrics_path.starts_with('/') {
            metrics_path.insert(0, '/');
        }
        if metrics_path == "/health" {
            return Err(ConfigError::InvalidMetricsPath(metrics_path));
        }

        let request_paths = split_list(&cli.request_paths);
        if request_paths.is_empty() {
            return Err(ConfigError::NoRequestPaths);
        }

        let domain_names = split_list(&cli.domain_names);
        if domain_names.is_empty() {
            tracing::warn!(
                "DOMAIN_NAMES is empty; the host filter will match no requests until it is set"
            );
        }

        let batch_size = cli.cf_batch_size.clamp(1, MAX_ZONE_BATCH);
        if batch_size != cli.cf_batch_size {
            tracing::warn!(
                "CF_BATCH_SIZE {} is out of range, using {batch_size}",
                cli.cf_batch_size
            );
        }

        Ok(Config {
            server: ServerConfig {
                listen,
                metrics_path,
            },
            provider: ProviderConfig {
                credentials,
                api_url: cli.cf_api_url,
                graphql_url: cli.cf_graphql_url,
            },
            scrape: ScrapeConfig {
                zone_ids: split_list(&cli.cf_zones),
                request_paths,
                domain_names,
                batch_size,
                scrape_delay_secs: cli.scrape_delay,
                interval: Duration::from_secs(cli.scrape_interval.max(1)),
                query_limit: cli.query_limit,
                query_timeout: Duration::from_secs(cli.query_timeout.max(1)),
                free_tier: cli.free_tier,
            },
            denylist,
        })
    }
}

/// Accepts `host:port` as well as the bare `:port` form
fn parse_listen(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    candidate
        .parse()
        .map_err(|_| ConfigError::InvalidListen(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricName;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["cloudflare-exporter"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("/api/%"), vec!["/api/%"]);
        assert_eq!(
            split_list("/api/%,/v1/.*,/health"),
            vec!["/api/%", "/v1/.*", "/health"]
        );
        assert_eq!(
            split_list("/api/%, /v1/.*, /health"),
            vec!["/api/%", "/v1/.*", "/health"]
        );
        assert_eq!(
            split_list("example.com, test.com, demo.net"),
            vec!["example.com", "test.com", "demo.net"]
        );
        assert!(split_list("").is_empty());
        assert_eq!(split_list("a,,b, "), vec!["a", "b"]);
    }

    #[test]
    fn test_from_cli_normalises_lists() {
        let config = Config::from_cli(cli(&[
            "--cf_api_token=test-token",
            "--request_paths=/api/%,/v1/.*",
            "--domain_names=example.com, test.com",
            "--cf_zones=zone1, zone2",
        ]))
        .unwrap();

        assert_eq!(config.scrape.request_paths, vec!["/api/%", "/v1/.*"]);
        assert_eq!(config.scrape.domain_names, vec!["example.com", "test.com"]);
        assert_eq!(config.scrape.zone_ids, vec!["zone1", "zone2"]);
        assert_eq!(
            config.provider.credentials,
            Credentials::Token("test-token".to_string())
        );
    }

    #[test]
    fn test_from_cli_defaults() {
        let config = Config::from_cli(cli(&["--cf_api_token=t"])).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.scrape.scrape_delay_secs, 300);
        assert_eq!(config.scrape.query_limit, 9999);
        assert_eq!(config.scrape.batch_size, MAX_ZONE_BATCH);
        assert_eq!(config.scrape.request_paths, vec!["/%"]);
        assert!(config.denylist.is_empty());
        assert!(!config.scrape.free_tier);
    }

    #[test]
    fn test_from_cli_requires_credentials() {
        let err = Config::from_cli(cli(&["--cf_api_key=key"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn test_from_cli_rejects_unknown_denylist_metric() {
        let err = Config::from_cli(cli(&[
            "--cf_api_token=t",
            "--metrics_denylist=unknown_metric",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Metric(MetricError::Unknown(ref name)) if name == "unknown_metric"
        ));
    }

    #[test]
    fn test_from_cli_accepts_known_denylist_metric() {
        let config = Config::from_cli(cli(&[
            "--cf_api_token=t",
            "--metrics_denylist=cloudflare_zone_requests_status_country_host",
        ]))
        .unwrap();
        assert!(config
            .denylist
            .contains(MetricName::ZoneRequestStatusCountryHost));
    }

    #[test]
    fn test_from_cli_clamps_batch_size() {
        let config = Config::from_cli(cli(&["--cf_api_token=t", "--cf_batch_size=50"])).unwrap();
        assert_eq!(config.scrape.batch_size, MAX_ZONE_BATCH);

        let config = Config::from_cli(cli(&["--cf_api_token=t", "--cf_batch_size=0"])).unwrap();
        assert_eq!(config.scrape.batch_size, 1);
    }

    #[test]
    fn test_from_cli_rejects_health_as_metrics_path() {
        let err =
            Config::from_cli(cli(&["--cf_api_token=t", "--metrics_path=health"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMetricsPath(_)));
    }

    #[test]
    fn test_from_cli_rejects_empty_request_paths() {
        for paths in ["--request_paths=", "--request_paths= , ,"] {
            let err = Config::from_cli(cli(&["--cf_api_token=t", paths])).unwrap_err();
            assert!(matches!(err, ConfigError::NoRequestPaths), "{paths}");
        }
    }

    #[test]
    fn test_parse_listen_short_form() {
        assert_eq!(parse_listen(":9199").unwrap(), "0.0.0.0:9199".parse().unwrap());
        assert!(matches!(
            parse_listen("not-an-address"),
            Err(ConfigError::InvalidListen(_))
        ));
    }
}
