use crate::error::CheckError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Load,
    Memory,
    Cpu,
    Disk,
    Filesystem,
    Network,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Load => "load",
            MetricKind::Memory => "memory",
            MetricKind::Cpu => "cpu",
            MetricKind::Disk => "disk",
            MetricKind::Filesystem => "filesystem",
            MetricKind::Network => "network",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::Memory | MetricKind::Cpu => "%",
            MetricKind::Disk | MetricKind::Network => "MB/s",
            MetricKind::Load | MetricKind::Filesystem => "",
        }
    }

    pub fn is_percentage(self) -> bool {
        self.unit() == "%"
    }

    /// Compiled-in (warning, critical) pair. Disk values are MB/s.
    pub fn default_thresholds(self) -> Option<(f64, f64)> {
        match self {
            MetricKind::Load => Some((1.0, 2.0)),
            MetricKind::Memory => Some((0.9, 0.95)),
            MetricKind::Cpu => Some((0.8, 0.9)),
            MetricKind::Disk => Some((10.0, 30.0)),
            MetricKind::Filesystem | MetricKind::Network => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RawResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Detail {
    Fields(Vec<(String, String)>),
    Text(String),
}

impl Detail {
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Detail::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Detail::Fields(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Detail::Text(_) => None,
        }
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Fields(fields) => {
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                Ok(())
            }
            Detail::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub level: f64,
    pub detail: Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Ok => "OK",
            Severity::Warning => "Warning",
            Severity::Critical => "Critical",
            Severity::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    /// Fills absent values from `fallback`.
    pub fn or(self, fallback: Thresholds) -> Thresholds {
        Thresholds {
            warning: self.warning.or(fallback.warning),
            critical: self.critical.or(fallback.critical),
        }
    }

    pub fn resolve(self, metric: MetricKind) -> Result<ResolvedThresholds, CheckError> {
        let defaults = metric.default_thresholds();
        let warning = self
            .warning
            .or(defaults.map(|(w, _)| w))
            .ok_or(CheckError::NotImplemented(metric))?;
        let critical = self
            .critical
            .or(defaults.map(|(_, c)| c))
            .ok_or(CheckError::NotImplemented(metric))?;
        Ok(ResolvedThresholds { warning, critical })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
