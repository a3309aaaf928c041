use crate::model::{MetricKind, Thresholds};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Connection and threshold flags as given on the command line.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckOptions {
    /// Which type of information to return
    #[arg(short = 'i', long, value_enum, default_value_t = MetricKind::Load)]
    pub information: MetricKind,
    /// The hostname or ip of the system to connect to [default: localhost]
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,
    /// Path to the ssh binary on this host [default: /usr/bin/ssh]
    #[arg(short = 'b', long)]
    pub binary: Option<String>,
    /// Timeout in seconds [default: 30]
    #[arg(short = 't', long)]
    pub timeout: Option<f64>,
    /// Warning threshold (ratio for memory/cpu, raw load, MB/s for disk)
    #[arg(short = 'w', long, allow_negative_numbers = true)]
    pub warning: Option<f64>,
    /// Critical threshold (ratio for memory/cpu, raw load, MB/s for disk)
    #[arg(short = 'c', long, allow_negative_numbers = true)]
    pub critical: Option<f64>,
    /// Login on the remote host [default: current user]
    #[arg(short = 'l', long)]
    pub logname: Option<String>,
    /// SSH private key file to use
    #[arg(short = 'k', long)]
    pub key: Option<String>,
    /// SSH port to use at the remote host
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
    /// Authentication password for the remote user
    #[arg(short = 'a', long)]
    pub authentication: Option<String>,
    /// Enable verbose output on stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
    /// Block size in bytes for the disk check [default: 4096]
    #[arg(long)]
    pub block_size: Option<u64>,
}

/// Optional YAML settings file; fills in whatever the command line leaves out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub binary: Option<String>,
    pub hostname: Option<String>,
    pub logname: Option<String>,
    pub key: Option<String>,
    pub port: Option<u16>,
    #[serde(deserialize_with = "deserialize_humantime")]
    pub timeout: Option<Duration>,
    pub block_size: Option<u64>,
    pub thresholds: BTreeMap<MetricKind, Thresholds>,
}

/// Immutable input for a single check run.
#[derive(Clone)]
pub struct CheckConfig {
    pub metric: MetricKind,
    pub hostname: String,
    pub binary: String,
    pub timeout: Duration,
    pub thresholds: Thresholds,
    pub logname: String,
    pub key: Option<String>,
    pub port: Option<u16>,
    /// Accepted for compatibility; the shell transport does not use it.
    pub authentication: Option<String>,
    pub verbose: bool,
    pub block_size: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Settings {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml_str(&text, &path_display)
    }

    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid, empty settings document.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Validation(
                    "timeout must be greater than zero".to_string(),
                ));
            }
        }
        if self.block_size == Some(0) {
            return Err(ConfigError::Validation(
                "block_size must be >= 1".to_string(),
            ));
        }
        validate_non_empty("binary", self.binary.as_deref())?;
        validate_non_empty("hostname", self.hostname.as_deref())?;
        validate_non_empty("logname", self.logname.as_deref())?;
        for (metric, thresholds) in &self.thresholds {
            validate_thresholds(&format!("thresholds.{metric}"), thresholds)?;
        }
        Ok(())
    }

    pub fn thresholds_for(&self, metric: MetricKind) -> Thresholds {
        self.thresholds.get(&metric).copied().unwrap_or_default()
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

impl CheckConfig {
    /// Merges command line, settings file and compiled defaults, in that order.
    pub fn resolve(options: &CheckOptions, settings: &Settings) -> Result<Self, ConfigError> {
        let metric = options.information;

        let timeout = match options.timeout {
            Some(secs) => timeout_from_secs(secs)?,
            None => settings
                .timeout
                .unwrap_or_else(|| Duration::from_secs_f64(default_timeout_secs())),
        };

        let block_size = options
            .block_size
            .or(settings.block_size)
            .unwrap_or(default_block_size());
        if block_size == 0 {
            return Err(ConfigError::Validation(
                "block size must be >= 1".to_string(),
            ));
        }

        let thresholds = Thresholds {
            warning: options.warning,
            critical: options.critical,
        }
        .or(settings.thresholds_for(metric));
        validate_thresholds("thresholds", &thresholds)?;

        let logname = options
            .logname
            .clone()
            .or_else(|| settings.logname.clone())
            .or_else(invoking_user)
            .ok_or_else(|| {
                ConfigError::Validation(
                    "no login name given and the current user could not be determined"
                        .to_string(),
                )
            })?;

        let hostname = options
            .hostname
            .clone()
            .or_else(|| settings.hostname.clone())
            .unwrap_or_else(default_hostname);
        let binary = options
            .binary
            .clone()
            .or_else(|| settings.binary.clone())
            .unwrap_or_else(default_binary);
        validate_non_empty("hostname", Some(&hostname))?;
        validate_non_empty("binary", Some(&binary))?;
        validate_non_empty("logname", Some(&logname))?;

        Ok(Self {
            metric,
            hostname,
            binary,
            timeout,
            thresholds,
            logname,
            key: options.key.clone().or_else(|| settings.key.clone()),
            port: options.port.or(settings.port),
            authentication: options.authentication.clone(),
            verbose: options.verbose,
            block_size,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.timeout / 10
    }
}

impl fmt::Debug for CheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckConfig")
            .field("metric", &self.metric)
            .field("hostname", &self.hostname)
            .field("binary", &self.binary)
            .field("timeout", &self.timeout)
            .field("thresholds", &self.thresholds)
            .field("logname", &self.logname)
            .field("key", &self.key)
            .field("port", &self.port)
            .field(
                "authentication",
                &self.authentication.as_ref().map(|_| "<redacted>"),
            )
            .field("verbose", &self.verbose)
            .field("block_size", &self.block_size)
            .finish()
    }
}

fn timeout_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "timeout must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|err| ConfigError::Validation(format!("timeout {secs} is out of range: {err}")))
}

fn validate_non_empty(field: &str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Validation(format!(
            "{field} must not be empty"
        ))),
        _ => Ok(()),
    }
}

fn validate_thresholds(field: &str, thresholds: &Thresholds) -> Result<(), ConfigError> {
    for (name, value) in [
        ("warning", thresholds.warning),
        ("critical", thresholds.critical),
    ] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "{field}.{name} must be a finite number"
                )));
            }
        }
    }
    Ok(())
}

fn invoking_user() -> Option<String> {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

fn deserialize_humantime<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_binary() -> String {
    "/usr/bin/ssh".to_string()
}

const fn default_timeout_secs() -> f64 {
    30.0
}

const fn default_block_size() -> u64 {
    4096
}

#[cfg(test)]
impl CheckConfig {
    pub fn for_test() -> Self {
        Self {
            metric: MetricKind::Load,
            hostname: default_hostname(),
            binary: default_binary(),
            timeout: Duration::from_secs_f64(default_timeout_secs()),
            thresholds: Thresholds::default(),
            logname: "nagios".to_string(),
            key: None,
            port: None,
            authentication: None,
            verbose: false,
            block_size: default_block_size(),
        }
    }
}
