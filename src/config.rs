use std::{fmt, path::Path, time::Duration};

use confique::Config as _;
use serde::{Deserialize, Deserializer};

use crate::{log::LogConfig, prelude::*};


const DEFAULT_PATHS: &[&str] = &["config.toml", "/etc/velotest/config.toml"];

/// Loads the configuration. An explicitly given path (CLI flag or
/// `VELOTEST_CONFIG_PATH`) must exist; otherwise the default locations are
/// tried in order. Values can always be overridden via the env vars
/// mentioned in the option docs.
pub fn load(explicit_path: Option<&Path>) -> Result<Config> {
    let env_path = std::env::var_os("VELOTEST_CONFIG_PATH");
    let explicit = explicit_path.map(Path::to_owned)
        .or_else(|| env_path.map(Into::into));

    let mut builder = Config::builder().env();
    match &explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file '{}' does not exist", path.display());
            }
            builder = builder.file(path);
        }
        None => {
            // Non-existing files are skipped by confique, so we can just
            // list all default locations.
            for path in DEFAULT_PATHS {
                builder = builder.file(path);
            }
        }
    }

    builder.load().context("failed to load configuration")
}

pub fn template() -> String {
    let mut options = confique::toml::FormatOptions::default();
    options.general.nested_field_gap = 2;
    confique::toml::template::<Config>(options)
}

#[derive(Debug, confique::Config)]
pub struct Config {
    #[config(nested)]
    pub target: TargetConfig,

    #[config(nested)]
    pub auth: AuthConfig,

    #[config(nested)]
    pub load: LoadConfig,

    #[config(nested)]
    pub log: LogConfig,
}

#[derive(Debug, confique::Config)]
pub struct TargetConfig {
    /// Base URL of the service to put load on, e.g. `https://localhost:3000`.
    /// Scheme and authority only, no path.
    #[config(default = "https://localhost:3000", env = "VELOTEST_TARGET_HOST")]
    pub host: TargetHost,

    /// Whether to accept invalid/self-signed TLS certificates. Only ever
    /// enable this for targets you control, typically local test
    /// deployments with self-signed certs.
    #[config(default = true)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, confique::Config)]
pub struct AuthConfig {
    /// Path of the token endpoint, relative to `target.host`. Each simulated
    /// user POSTs its credentials here once on startup.
    #[config(default = "/auth/token", validate = validate_url_path)]
    pub token_path: String,

    /// Username to log in with.
    #[config(default = "admin", env = "VELOTEST_AUTH_USERNAME")]
    pub username: String,

    /// Password to log in with. Deliberately has no default: set it here or
    /// via the env var to keep secrets out of checked-in files.
    #[config(env = "VELOTEST_AUTH_PASSWORD")]
    pub password: String,
}

#[derive(Debug, confique::Config)]
pub struct LoadConfig {
    /// Number of simulated users running concurrently.
    #[config(default = 500, validate(*users > 0, "must be positive"))]
    pub users: usize,

    /// How many users to start per second. If unset, the harness default
    /// (one per second) is used.
    #[config(validate = validate_positive)]
    pub hatch_rate: Option<f64>,

    /// How long the load test runs once all users are started, e.g. "90s" or
    /// "10min". Must be a whole number of seconds. "0" means: run until
    /// CTRL+C.
    #[config(default = "0", deserialize_with = deserialize_duration, validate = validate_run_time)]
    pub run_time: Duration,

    /// Task executions per second, per user. Each user pauses for
    /// `1 / throughput` seconds between two task executions. The default of
    /// 0.1 means one task every 10 seconds.
    #[config(default = 0.1, validate = validate_positive)]
    pub throughput: f64,
}

fn validate_positive(value: &f64) -> Result<(), &'static str> {
    if !(value.is_finite() && *value > 0.0) {
        return Err("must be a positive number");
    }
    Ok(())
}

fn validate_run_time(value: &Duration) -> Result<(), &'static str> {
    // The harness only understands whole seconds, so reject anything that
    // would be silently truncated.
    if value.subsec_nanos() != 0 {
        return Err("must be a whole number of seconds");
    }
    Ok(())
}

/// Base URL of the load test target: http(s) scheme plus authority, nothing
/// else. Stored without trailing slash so paths can simply be appended.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TargetHost(String);

impl TargetHost {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TargetHost {
    type Error = &'static str;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.trim() != s {
            return Err("has leading or trailing whitespace");
        }
        let Some((scheme, authority)) = s.split_once("://") else {
            return Err("invalid URL: does not contain scheme");
        };
        if scheme != "http" && scheme != "https" {
            return Err("must have HTTP or HTTPS scheme");
        }
        if authority.is_empty() {
            return Err("missing host");
        }
        if ['/', '?', '#', '@'].iter().any(|c| authority.contains(*c)) {
            return Err("must not contain path, query, fragment or user part");
        }

        Ok(Self(s))
    }
}

/// Makes sure that the given string is a valid URL path without query part.
pub fn validate_url_path(value: &String) -> Result<(), &'static str> {
    if !value.starts_with('/') {
        return Err("must start with '/'");
    }
    if value.chars().any(|c| c.is_whitespace()) || value.contains(['?', '#']) {
        return Err("must not contain whitespace, '?' or '#'");
    }
    Ok(())
}

/// Custom format for durations. We allow a couple useful units and require
/// a unit to increase readability of config files.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: Deserializer<'de>,
{
    use serde::de::Error;

    let s = String::deserialize(deserializer)?;

    // Allow unit-less zeroes
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let start_unit = s.find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| D::Error::custom("no time unit for duration"))?;
    let (num, unit) = s.split_at(start_unit);
    let num: u64 = num.parse()
        .map_err(|e| D::Error::custom(format!("invalid integer for duration: {}", e)))?;

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(Duration::from_secs(num)),
        "min" => Ok(Duration::from_secs(num * 60)),
        "h" => Ok(Duration::from_secs(num * 60 * 60)),
        "d" => Ok(Duration::from_secs(num * 60 * 60 * 24)),
        _ => Err(D::Error::custom("invalid unit of time for duration")),
    }
}
