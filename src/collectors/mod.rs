pub mod cpu;
pub mod disk;
pub mod load;
pub mod memory;

use crate::error::{one_line, CheckError};
use crate::model::{MetricKind, MetricSample, RawResult};
use std::str::FromStr;

pub use cpu::CpuParser;
pub use disk::DiskParser;
pub use load::LoadParser;
pub use memory::MemoryParser;

/// Turns the raw output of a metric's remote command into a sample.
pub trait MetricParser: Send + Sync {
    fn metric(&self) -> MetricKind;

    fn parse(&self, raw: &RawResult) -> Result<MetricSample, CheckError>;
}

pub fn parser_for(metric: MetricKind, block_size: u64) -> Result<Box<dyn MetricParser>, CheckError> {
    match metric {
        MetricKind::Load => Ok(Box::new(LoadParser)),
        MetricKind::Memory => Ok(Box::new(MemoryParser)),
        MetricKind::Cpu => Ok(Box::new(CpuParser)),
        MetricKind::Disk => Ok(Box::new(DiskParser::new(block_size))),
        MetricKind::Filesystem | MetricKind::Network => Err(CheckError::NotImplemented(metric)),
    }
}

fn require_success(raw: &RawResult, command: &'static str) -> Result<(), CheckError> {
    if raw.exit_status == 0 {
        return Ok(());
    }
    Err(CheckError::CommandFailed {
        command,
        stdout: one_line(&raw.stdout),
        stderr: one_line(&raw.stderr),
    })
}

/// Whitespace-separated tokens of line `index`.
fn line_tokens<'a>(
    metric: MetricKind,
    raw: &RawResult,
    lines: &[&'a str],
    index: usize,
) -> Result<Vec<&'a str>, CheckError> {
    lines
        .get(index)
        .map(|line| line.split_whitespace().collect())
        .ok_or_else(|| {
            CheckError::parse(
                metric,
                format!("expected at least {} lines, got {}", index + 1, lines.len()),
                &raw.stdout,
            )
        })
}

fn token<'a>(
    metric: MetricKind,
    raw: &RawResult,
    tokens: &[&'a str],
    index: usize,
    name: &str,
) -> Result<&'a str, CheckError> {
    tokens.get(index).copied().ok_or_else(|| {
        CheckError::parse(
            metric,
            format!("missing {name} column (index {index})"),
            &raw.stdout,
        )
    })
}

fn number<T: FromStr>(
    metric: MetricKind,
    raw: &RawResult,
    value: &str,
    name: &str,
) -> Result<T, CheckError> {
    value.parse().map_err(|_| {
        CheckError::parse(
            metric,
            format!("{name} is not a number: {value:?}"),
            &raw.stdout,
        )
    })
}

#[cfg(test)]
pub(crate) fn ok_result(stdout: &str) -> RawResult {
    RawResult {
        exit_status: 0,
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}
