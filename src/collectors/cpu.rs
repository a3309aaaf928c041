use super::{number, require_success, MetricParser};
use crate::error::CheckError;
use crate::model::{Detail, MetricKind, MetricSample, RawResult};

const COLUMNS: [&str; 7] = ["user", "nice", "system", "idle", "iowait", "irq", "softirq"];
const IDLE: usize = 3;

/// Parses two consecutive `/proc/stat` dumps taken one second apart.
///
/// The output is split into two equal halves and the aggregate `cpu` line
/// heading each half is compared column by column.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuParser;

impl CpuParser {
    fn counters(&self, raw: &RawResult, line: &str) -> Result<[i64; 7], CheckError> {
        let metric = self.metric();
        let values: Vec<&str> = line.split_whitespace().skip(1).collect();
        if values.len() < COLUMNS.len() {
            return Err(CheckError::parse(
                metric,
                format!(
                    "expected {} counters on the cpu line, got {}",
                    COLUMNS.len(),
                    values.len()
                ),
                &raw.stdout,
            ));
        }

        let mut counters = [0_i64; 7];
        for (slot, (value, name)) in counters.iter_mut().zip(values.iter().zip(COLUMNS)) {
            *slot = number(metric, raw, value, name)?;
        }
        Ok(counters)
    }
}

impl MetricParser for CpuParser {
    fn metric(&self) -> MetricKind {
        MetricKind::Cpu
    }

    fn parse(&self, raw: &RawResult) -> Result<MetricSample, CheckError> {
        require_success(raw, "stat")?;
        let text = raw.stdout_text();
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() || lines.len() % 2 != 0 {
            return Err(CheckError::SamplesMismatch);
        }

        let before = self.counters(raw, lines[0])?;
        let after = self.counters(raw, lines[lines.len() / 2])?;

        let mut delta = [0_i64; 7];
        for (d, (b, a)) in delta.iter_mut().zip(before.iter().zip(after.iter())) {
            *d = a - b;
        }
        let total: i64 = delta.iter().sum();
        let busy = total - delta[IDLE];
        if total <= 0 || busy < 0 {
            return Err(CheckError::parse(
                self.metric(),
                format!("no cpu time elapsed between samples (total delta {total})"),
                &raw.stdout,
            ));
        }

        Ok(MetricSample {
            level: busy as f64 / total as f64,
            detail: Detail::fields(COLUMNS.into_iter().zip(delta)),
        })
    }
}
