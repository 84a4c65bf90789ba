use crate::rollup::calendar::WeekStart;
use crate::rollup::rates::{ad_rates, search_rates, RateSpec};
use crate::sheet::columns::SheetLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of exported ranges, one `<range>.csv` per range.
    #[serde(default = "default_sheets_dir")]
    pub sheets_dir: PathBuf,
    /// Response cache TTL in seconds (default: 60). 0 = no caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Periods returned when a request does not ask for a count (default: 8).
    #[serde(default = "default_periods")]
    pub default_periods: usize,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Dashboard origin for CORS restrictions. If not set, any origin may read.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub combined: CombinedConfig,
}

/// One sheet range and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub range: String,
    #[serde(flatten)]
    pub layout: SheetLayout,
    #[serde(default)]
    pub week_starts_on: WeekStart,
    #[serde(default = "ad_rates")]
    pub rates: Vec<RateSpec>,
}

/// Sources AND-joined by the combined weekly view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedConfig {
    #[serde(default = "default_combined_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_periods")]
    pub weeks: usize,
    #[serde(default)]
    pub week_starts_on: WeekStart,
    #[serde(default = "ad_rates")]
    pub rates: Vec<RateSpec>,
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            sources: default_combined_sources(),
            weeks: default_periods(),
            week_starts_on: WeekStart::default(),
            rates: ad_rates(),
        }
    }
}

/// Upper bound on periods per response, shared with request validation.
pub const MAX_PERIODS: usize = 52;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_sheets_dir() -> PathBuf {
    PathBuf::from("sheets")
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_periods() -> usize {
    8
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_combined_sources() -> Vec<String> {
    vec!["gsc".to_string(), "gads".to_string(), "bing".to_string()]
}

fn metric_headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(metric, header)| ((*metric).to_string(), (*header).to_string()))
        .collect()
}

/// The Adveronix daily exports: Search Console, Google Ads and Bing Ads.
fn default_sources() -> Vec<SourceConfig> {
    let ads_metrics = metric_headers(&[
        ("clicks", "Clicks"),
        ("impressions", "Impressions"),
        ("conversions", "Conversions"),
        ("cost", "Cost"),
    ]);
    vec![
        SourceConfig {
            name: "gsc".to_string(),
            range: "gsc_daily".to_string(),
            layout: SheetLayout {
                date_column: "Date".to_string(),
                key_column: None,
                metrics: metric_headers(&[("clicks", "Clicks"), ("impressions", "Impressions")]),
                dedupe: true,
            },
            week_starts_on: WeekStart::Monday,
            rates: search_rates(),
        },
        SourceConfig {
            name: "gads".to_string(),
            range: "gads_daily".to_string(),
            layout: SheetLayout {
                date_column: "Date".to_string(),
                key_column: Some("Campaign".to_string()),
                metrics: ads_metrics.clone(),
                dedupe: true,
            },
            week_starts_on: WeekStart::Monday,
            rates: ad_rates(),
        },
        SourceConfig {
            name: "bing".to_string(),
            range: "bing_daily".to_string(),
            layout: SheetLayout {
                date_column: "Date".to_string(),
                key_column: Some("Campaign".to_string()),
                metrics: ads_metrics,
                dedupe: true,
            },
            week_starts_on: WeekStart::Monday,
            rates: ad_rates(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            sheets_dir: default_sheets_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            default_periods: default_periods(),
            request_timeout_secs: default_request_timeout_secs(),
            dashboard_origin: None,
            sources: default_sources(),
            combined: CombinedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `ROLLUP_HOST` → host
    /// - `ROLLUP_PORT` → port
    /// - `ROLLUP_SHEETS_DIR` → sheets_dir
    /// - `ROLLUP_CACHE_TTL` → cache_ttl_secs
    /// - `ROLLUP_DEFAULT_PERIODS` → default_periods
    /// - `ROLLUP_REQUEST_TIMEOUT` → request_timeout_secs
    /// - `ROLLUP_DASHBOARD_ORIGIN` → dashboard_origin
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("ROLLUP_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("ROLLUP_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(dir) = std::env::var("ROLLUP_SHEETS_DIR") {
            config.sheets_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("ROLLUP_CACHE_TTL") {
            if let Ok(t) = val.parse() {
                config.cache_ttl_secs = t;
            }
        }
        if let Ok(val) = std::env::var("ROLLUP_DEFAULT_PERIODS") {
            if let Ok(n) = val.parse() {
                config.default_periods = n;
            }
        }
        if let Ok(val) = std::env::var("ROLLUP_REQUEST_TIMEOUT") {
            if let Ok(t) = val.parse() {
                config.request_timeout_secs = t;
            }
        }
        if let Ok(origin) = std::env::var("ROLLUP_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin);
        }

        config.validate();
        config
    }

    /// Replace out-of-range values with defaults, warning about each.
    fn validate(&mut self) {
        if !(1..=MAX_PERIODS).contains(&self.default_periods) {
            tracing::warn!(
                default_periods = self.default_periods,
                "default_periods must be between 1 and {MAX_PERIODS}, using {}",
                default_periods()
            );
            self.default_periods = default_periods();
        }
        if !(1..=MAX_PERIODS).contains(&self.combined.weeks) {
            tracing::warn!(
                weeks = self.combined.weeks,
                "combined.weeks must be between 1 and {MAX_PERIODS}, using {}",
                default_periods()
            );
            self.combined.weeks = default_periods();
        }

        let sources = &self.sources;
        self.combined.sources.retain(|name| {
            let known = sources.iter().any(|s| &s.name == name);
            if !known {
                tracing::warn!(source = %name, "Combined view names an unconfigured source, dropping it");
            }
            known
        });
    }

    /// Look up a configured source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that call `Config::load`, which reads process-wide
    /// environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.sheets_dir, PathBuf::from("sheets"));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.default_periods, 8);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.dashboard_origin.is_none());
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.combined.sources, vec!["gsc", "gads", "bing"]);
        assert_eq!(config.combined.weeks, 8);
    }

    #[test]
    fn test_default_sources_resolve() {
        let config = Config::default();
        for name in &config.combined.sources {
            assert!(config.source(name).is_some(), "missing source {name}");
        }
        let gads = config.source("gads").unwrap();
        assert_eq!(gads.range, "gads_daily");
        assert_eq!(gads.layout.key_column.as_deref(), Some("Campaign"));
        assert_eq!(gads.layout.metrics["cost"], "Cost");
    }

    #[test]
    fn test_load_from_toml() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
host = "127.0.0.1"
port = 9000
sheets_dir = "/srv/adveronix"
cache_ttl_secs = 0
default_periods = 12
dashboard_origin = "https://dash.example.com"

[[sources]]
name = "ga4"
range = "ga4_daily"
date_column = "Day"
key_column = "Landing page"
metrics = {{ sessions = "Sessions", conversions = "Key events" }}
week_starts_on = "sunday"
rates = [{{ name = "conv_rate", numerator = "conversions", denominator = "sessions", scale = 100.0 }}]

[combined]
sources = ["ga4"]
weeks = 4
"#
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.sheets_dir, PathBuf::from("/srv/adveronix"));
        assert_eq!(config.cache_ttl_secs, 0);
        assert_eq!(config.default_periods, 12);
        assert_eq!(
            config.dashboard_origin.as_deref(),
            Some("https://dash.example.com")
        );

        assert_eq!(config.sources.len(), 1);
        let ga4 = config.source("ga4").unwrap();
        assert_eq!(ga4.layout.date_column, "Day");
        assert_eq!(ga4.layout.metrics["conversions"], "Key events");
        assert!(!ga4.layout.dedupe);
        assert_eq!(ga4.week_starts_on, WeekStart::Sunday);
        assert_eq!(ga4.rates.len(), 1);

        assert_eq!(config.combined.sources, vec!["ga4"]);
        assert_eq!(config.combined.weeks, 4);
        assert_eq!(config.combined.week_starts_on, WeekStart::Monday);
    }

    #[test]
    fn test_source_rates_default_to_ad_rates() {
        let source: SourceConfig = toml::from_str(
            r#"
name = "bing"
range = "bing_daily"
date_column = "Date"
metrics = { clicks = "Clicks" }
"#,
        )
        .unwrap();
        assert_eq!(source.rates, ad_rates());
        assert_eq!(source.week_starts_on, WeekStart::Monday);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_load_no_path_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(None);
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();

        let orig_port = std::env::var("ROLLUP_PORT").ok();
        let orig_ttl = std::env::var("ROLLUP_CACHE_TTL").ok();

        std::env::set_var("ROLLUP_PORT", "3000");
        std::env::set_var("ROLLUP_CACHE_TTL", "5");
        let config = Config::load(None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl_secs, 5);

        match orig_port {
            Some(v) => std::env::set_var("ROLLUP_PORT", v),
            None => std::env::remove_var("ROLLUP_PORT"),
        }
        match orig_ttl {
            Some(v) => std::env::set_var("ROLLUP_CACHE_TTL", v),
            None => std::env::remove_var("ROLLUP_CACHE_TTL"),
        }
    }

    #[test]
    fn test_invalid_toml_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "this is not valid toml {{{").unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_zero_default_periods_env_falls_back() {
        let _guard = ENV_LOCK.lock().unwrap();
        let orig = std::env::var("ROLLUP_DEFAULT_PERIODS").ok();

        std::env::set_var("ROLLUP_DEFAULT_PERIODS", "0");
        let config = Config::load(None);
        assert_eq!(config.default_periods, 8);

        match orig {
            Some(v) => std::env::set_var("ROLLUP_DEFAULT_PERIODS", v),
            None => std::env::remove_var("ROLLUP_DEFAULT_PERIODS"),
        }
    }

    #[test]
    fn test_out_of_range_periods_in_toml_fall_back() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "default_periods = 100\n\n[combined]\nweeks = 0\n",
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.default_periods, 8);
        assert_eq!(config.combined.weeks, 8);
    }

    #[test]
    fn test_unknown_combined_source_is_dropped() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[combined]\nsources = [\"gsc\", \"ga4\", \"bing\"]\n",
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.combined.sources, vec!["gsc", "bing"]);
    }
}
