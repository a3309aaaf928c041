use crate::config::ConfigError;
use crate::model::{Evaluation, MetricKind, Severity};
use crate::thresholds::format_decimal;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("remote command returncode {status} | out={stdout};err={stderr}")]
    Transport {
        status: i32,
        stdout: String,
        stderr: String,
    },
    #[error("{command} returned: {stdout} | {stderr}")]
    CommandFailed {
        command: &'static str,
        stdout: String,
        stderr: String,
    },
    #[error("timeout after {phase} ({}s)", format_decimal(.timeout.as_secs_f64()))]
    Timeout { phase: String, timeout: Duration },
    #[error("could not parse {metric} output: {reason} | out={output}")]
    Parse {
        metric: MetricKind,
        reason: String,
        output: String,
    },
    #[error("successive calls of /proc/stat were too different")]
    SamplesMismatch,
    #[error("no collection method is implemented for {0}")]
    NotImplemented(MetricKind),
    #[error("could not start remote command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("could not wait for remote command: {0}")]
    Wait(#[source] std::io::Error),
    #[error("could not read remote command output: {0}")]
    Output(#[source] std::io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CheckError {
    pub fn parse(metric: MetricKind, reason: impl Into<String>, output: &[u8]) -> Self {
        CheckError::Parse {
            metric,
            reason: reason.into(),
            output: one_line(output),
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Unknown
    }

    pub fn into_evaluation(self) -> Evaluation {
        let severity = self.severity();
        Evaluation {
            severity,
            message: format!("{severity}: {self}"),
        }
    }
}

/// Folds raw remote output onto a single line so the plugin output stays one line.
pub fn one_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end()
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_phase_and_seconds() {
        let err = CheckError::Timeout {
            phase: "waiting for remote command".to_string(),
            timeout: Duration::from_secs_f64(2.5),
        };
        let eval = err.into_evaluation();
        assert_eq!(eval.severity, Severity::Unknown);
        assert_eq!(
            eval.message,
            "Unknown: timeout after waiting for remote command (2.5s)"
        );
    }

    #[test]
    fn whole_second_timeout_keeps_a_decimal_place() {
        let err = CheckError::Timeout {
            phase: "waiting for remote command".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "timeout after waiting for remote command (30.0s)");
    }

    #[test]
    fn wait_failure_is_not_reported_as_spawn_failure() {
        let err = CheckError::Wait(std::io::Error::other("ECHILD"));
        assert_eq!(err.to_string(), "could not wait for remote command: ECHILD");
    }

    #[test]
    fn not_implemented_is_distinct_unknown() {
        let eval = CheckError::NotImplemented(MetricKind::Filesystem).into_evaluation();
        assert_eq!(eval.severity, Severity::Unknown);
        assert_eq!(
            eval.message,
            "Unknown: no collection method is implemented for filesystem"
        );
    }

    #[test]
    fn one_line_escapes_newlines() {
        assert_eq!(one_line(b"a\nb\r\nc\n"), "a\\nb\\nc");
    }
}
