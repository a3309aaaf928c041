use super::{line_tokens, number, require_success, token, MetricParser};
use crate::error::CheckError;
use crate::model::{Detail, MetricKind, MetricSample, RawResult};

/// Parses `/proc/loadavg` followed by a line holding the core count.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadParser;

impl MetricParser for LoadParser {
    fn metric(&self) -> MetricKind {
        MetricKind::Load
    }

    fn parse(&self, raw: &RawResult) -> Result<MetricSample, CheckError> {
        require_success(raw, "loadavg")?;
        let metric = self.metric();
        let text = raw.stdout_text();
        let lines: Vec<&str> = text.lines().collect();
        let fields = line_tokens(metric, raw, &lines, 0)?;
        let cores_line = line_tokens(metric, raw, &lines, 1)?;

        let first = token(metric, raw, &fields, 0, "5min")?;
        let second = token(metric, raw, &fields, 1, "10min")?;
        let third = token(metric, raw, &fields, 2, "15min")?;
        let procs_field = token(metric, raw, &fields, 3, "running/procs")?;
        let last = token(metric, raw, &fields, 4, "last")?;
        let cores: u64 = number(metric, raw, token(metric, raw, &cores_line, 0, "cores")?, "cores")?;

        let load: f64 = number(metric, raw, first, "5min")?;
        number::<f64>(metric, raw, second, "10min")?;
        number::<f64>(metric, raw, third, "15min")?;

        let (running, procs) = procs_field.split_once('/').ok_or_else(|| {
            CheckError::parse(
                metric,
                format!("expected running/total processes, got {procs_field:?}"),
                &raw.stdout,
            )
        })?;
        let running: u64 = number(metric, raw, running, "running")?;
        let procs: u64 = number(metric, raw, procs, "procs")?;

        if cores == 0 {
            return Err(CheckError::parse(metric, "core count is zero", &raw.stdout));
        }
        if !(load.is_finite() && load >= 0.0) {
            return Err(CheckError::parse(
                metric,
                format!("load average out of range: {first}"),
                &raw.stdout,
            ));
        }

        // The averages keep the remote's own spelling, e.g. "1.00".
        Ok(MetricSample {
            level: load / cores as f64,
            detail: Detail::fields([
                ("5min", first.to_string()),
                ("10min", second.to_string()),
                ("15min", third.to_string()),
                ("running", running.to_string()),
                ("procs", procs.to_string()),
                ("last", last.to_string()),
                ("cores", cores.to_string()),
            ]),
        })
    }
}
