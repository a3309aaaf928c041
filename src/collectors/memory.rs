use super::{line_tokens, number, require_success, token, MetricParser};
use crate::error::CheckError;
use crate::model::{Detail, MetricKind, MetricSample, RawResult};

/// Parses `free -m`.
///
/// Line 2 is the `Mem:` row (total, shared, buffers, cache); line 3 carries
/// used and free memory in columns 2 and 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryParser;

impl MetricParser for MemoryParser {
    fn metric(&self) -> MetricKind {
        MetricKind::Memory
    }

    fn parse(&self, raw: &RawResult) -> Result<MetricSample, CheckError> {
        require_success(raw, "free")?;
        let metric = self.metric();
        let text = raw.stdout_text();
        let lines: Vec<&str> = text.lines().collect();
        let totals = line_tokens(metric, raw, &lines, 1)?;
        let usage = line_tokens(metric, raw, &lines, 2)?;

        let column = |tokens: &[&str], index: usize, name: &str| -> Result<u64, CheckError> {
            number(metric, raw, token(metric, raw, tokens, index, name)?, name)
        };
        let total = column(&totals, 1, "total")?;
        let used = column(&usage, 2, "used")?;
        let free = column(&usage, 3, "free")?;
        let shared = column(&totals, 4, "shared")?;
        let buff = column(&totals, 5, "buff")?;
        let cache = column(&totals, 6, "cache")?;

        if total == 0 {
            return Err(CheckError::parse(metric, "total memory is zero", &raw.stdout));
        }

        Ok(MetricSample {
            level: used as f64 / total as f64,
            detail: Detail::fields([
                ("total", total),
                ("used", used),
                ("free", free),
                ("shared", shared),
                ("buff", buff),
                ("cache", cache),
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::ok_result;

    const FREE_OUTPUT: &str = "\
             total       used       free     shared    buffers     cached
Mem:          1000        900        100         20         30        370
-/+ buffers/cache:        500        500
Swap:         2047          0       2047
";

    #[test]
    fn level_is_used_over_total() {
        let sample = MemoryParser.parse(&ok_result(FREE_OUTPUT)).expect("valid");
        assert_eq!(sample.level, 0.5);
        assert_eq!(
            sample.detail.to_string(),
            "total=1000;used=500;free=500;shared=20;buff=30;cache=370"
        );
    }

    #[test]
    fn failed_free_is_reported_with_output() {
        let raw = RawResult {
            exit_status: 127,
            stdout: Vec::new(),
            stderr: b"free: command not found\n".to_vec(),
        };
        let eval = MemoryParser
            .parse(&raw)
            .expect_err("non-zero exit")
            .into_evaluation();
        assert_eq!(
            eval.message,
            "Unknown: free returned:  | free: command not found"
        );
    }

    #[test]
    fn short_output_is_a_parse_failure() {
        let err = MemoryParser
            .parse(&ok_result("             total       used\nMem: 1000 500\n"))
            .expect_err("only two lines");
        assert!(matches!(err, CheckError::Parse { metric: MetricKind::Memory, .. }));
    }

    #[test]
    fn missing_columns_are_a_parse_failure() {
        let err = MemoryParser
            .parse(&ok_result("header\nMem: 1000 900 100\n-/+ buffers/cache: 500 500\n"))
            .expect_err("mem row is short");
        assert!(err.to_string().contains("missing shared column"));
    }

    #[test]
    fn zero_total_is_rejected() {
        let output = "h\nMem: 0 0 0 0 0 0\n-/+ buffers/cache: 0 0\n";
        let err = MemoryParser.parse(&ok_result(output)).expect_err("zero total");
        assert!(err.to_string().contains("total memory is zero"));
    }
}
