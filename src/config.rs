//! Configuration module for the rankprof application.
//!
//! Values come from environment variables (after `.env` is loaded) through
//! figment. Durations accept human-readable strings such as `5s` or `250ms`,
//! or a bare integer number of seconds.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::Env;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};

use crate::data::faculty::SchemaLayout;
use crate::data::names::DUPLICATE_THRESHOLD;
use crate::data::profiles::DEFAULT_INSTITUTIONAL_DOMAIN;
use crate::data::ranking::QUALIFICATION_THRESHOLD;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base log level for this crate's targets (`trace`..`error`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL connection string. Without one the in-memory backend is used.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub schema_layout: SchemaLayout,
    #[serde(default = "default_institutional_domain")]
    pub institutional_domain: String,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,
    #[serde(default = "default_qualification_threshold")]
    pub qualification_threshold: u32,
    #[serde(default)]
    pub allow_faculty_change: bool,
    /// Deadline for each data service call.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// Grace period for in-flight requests after a shutdown signal.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Per-user ranking view state untouched this long is discarded.
    #[serde(default = "default_view_ttl", deserialize_with = "deserialize_duration")]
    pub view_ttl: Duration,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_institutional_domain() -> String {
    DEFAULT_INSTITUTIONAL_DOMAIN.to_owned()
}

fn default_duplicate_threshold() -> usize {
    DUPLICATE_THRESHOLD
}

fn default_qualification_threshold() -> u32 {
    QUALIFICATION_THRESHOLD
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_view_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            port: default_port(),
            database_url: None,
            schema_layout: SchemaLayout::default(),
            institutional_domain: default_institutional_domain(),
            duplicate_threshold: default_duplicate_threshold(),
            qualification_threshold: default_qualification_threshold(),
            allow_faculty_change: false,
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            view_ttl: default_view_ttl(),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("Failed to load config")
    }
}

static DURATION_PARSER: LazyLock<DurationParser<'static>> = LazyLock::new(|| {
    DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
});

/// Parse a duration such as `5s`, `250ms` or `1.5m`. Unitless numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let parsed = DURATION_PARSER
        .parse(s.trim())
        .map_err(|e| format!("invalid duration {s:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {s:?}: {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};

    fn from_toml(toml: &str) -> anyhow::Result<Config> {
        Config::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn empty_source_yields_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.schema_layout, SchemaLayout::Unified);
        assert_eq!(config.institutional_domain, "alumnos.ucn.cl");
        assert_eq!(config.duplicate_threshold, 2);
        assert_eq!(config.qualification_threshold, 5);
        assert!(!config.allow_faculty_change);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.view_ttl, Duration::from_secs(900));
    }

    #[test]
    fn durations_accept_units_and_bare_seconds() {
        let config = from_toml(
            r#"
            request_timeout = "250ms"
            shutdown_timeout = 3
            view_ttl = "1m"
            "#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.view_ttl, Duration::from_secs(60));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        assert!(from_toml(r#"request_timeout = "soon""#).is_err());
    }

    #[test]
    fn layout_and_thresholds_override() {
        let config = from_toml(
            r#"
            schema_layout = "legacy"
            duplicate_threshold = 3
            allow_faculty_change = true
            "#,
        )
        .unwrap();
        assert_eq!(config.schema_layout, SchemaLayout::Legacy);
        assert_eq!(config.duplicate_threshold, 3);
        assert!(config.allow_faculty_change);
    }

    #[test]
    fn parse_duration_helper() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("").is_err());
    }
}
