use super::{line_tokens, number, require_success, token, MetricParser};
use crate::error::CheckError;
use crate::model::{Detail, MetricKind, MetricSample, RawResult};

const MEGA: u64 = 1024 * 1024;
const BLOCKS_COLUMN: usize = 8;

/// Parses the last sample line of `vmstat 10 2`.
///
/// mb_in and mb_out are both read from the `bi` column.
#[derive(Debug, Clone, Copy)]
pub struct DiskParser {
    block_size: u64,
}

impl DiskParser {
    pub fn new(block_size: u64) -> Self {
        Self { block_size }
    }
}

impl Default for DiskParser {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl MetricParser for DiskParser {
    fn metric(&self) -> MetricKind {
        MetricKind::Disk
    }

    fn parse(&self, raw: &RawResult) -> Result<MetricSample, CheckError> {
        require_success(raw, "vmstat")?;
        let metric = self.metric();
        let text = raw.stdout_text();
        let lines: Vec<&str> = text.lines().collect();
        let last = line_tokens(metric, raw, &lines, lines.len().saturating_sub(1))?;

        let blocks_in: u64 = number(
            metric,
            raw,
            token(metric, raw, &last, BLOCKS_COLUMN, "blocks in")?,
            "blocks in",
        )?;
        let blocks_out: u64 = number(
            metric,
            raw,
            token(metric, raw, &last, BLOCKS_COLUMN, "blocks out")?,
            "blocks out",
        )?;

        let bytes_in = blocks_in.saturating_mul(self.block_size);
        let bytes_out = blocks_out.saturating_mul(self.block_size);
        let mb_in = bytes_in as f64 / MEGA as f64;
        let mb_out = bytes_out as f64 / MEGA as f64;

        Ok(MetricSample {
            level: mb_in + mb_out,
            detail: Detail::Text(format!(
                "mb_in={};mb_out={}",
                bytes_in / MEGA,
                bytes_out / MEGA
            )),
        })
    }
}
