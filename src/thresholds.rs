use crate::error::CheckError;
use crate::model::{Evaluation, MetricKind, MetricSample, Severity, Thresholds};

/// Compares a sample against its thresholds and renders the plugin line.
///
/// Comparisons always use the raw level; percentage metrics are only scaled
/// for display.
pub fn evaluate(
    metric: MetricKind,
    sample: &MetricSample,
    thresholds: Thresholds,
) -> Result<Evaluation, CheckError> {
    let resolved = thresholds.resolve(metric)?;
    let (warn, crit) = (resolved.warning, resolved.critical);
    let level = sample.level;
    let detail = &sample.detail;
    let unit = metric.unit();
    let shown = if metric.is_percentage() {
        format_general(level * 100.0, 2)
    } else {
        format_general(level, 2)
    };

    // A warning threshold at or above critical is reported as a warning.
    if warn >= crit {
        return Ok(Evaluation {
            severity: Severity::Warning,
            message: format!(
                "Warning: warn ({}) > crit ({}) for {metric} | {detail}",
                format_decimal(warn),
                format_decimal(crit)
            ),
        });
    }

    let evaluation = if level < warn && level < crit {
        Evaluation {
            severity: Severity::Ok,
            message: format!("OK: {metric} usage is {shown}{unit} | {detail}"),
        }
    } else if level > warn && level < crit {
        Evaluation {
            severity: Severity::Warning,
            message: format!("Warning: {metric} usage is high {shown}{unit} | {detail}"),
        }
    } else if level > crit {
        Evaluation {
            severity: Severity::Critical,
            message: format!("Critical: {metric} usage is critical {shown}{unit} | {detail}"),
        }
    } else {
        Evaluation {
            severity: Severity::Unknown,
            message: format!("Unknown: no conditions were met{detail}"),
        }
    };
    Ok(evaluation)
}

/// Formats like C's `%.<precision>g`: significant digits, trailing zeros
/// dropped, scientific notation for very large or small magnitudes.
pub fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }
    let precision = precision.max(1);
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

/// Shortest round-trip form, keeping one decimal place on whole values
/// (`10.0`, `0.05`).
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Detail;

    fn sample(level: f64) -> MetricSample {
        MetricSample {
            level,
            detail: Detail::fields([("user", 1), ("idle", 2)]),
        }
    }

    fn cpu_thresholds() -> Thresholds {
        Thresholds {
            warning: Some(0.8),
            critical: Some(0.9),
        }
    }

    #[test]
    fn between_thresholds_is_warning() {
        let eval = evaluate(MetricKind::Cpu, &sample(0.85), cpu_thresholds()).expect("evaluated");
        assert_eq!(eval.severity, Severity::Warning);
        assert_eq!(eval.message, "Warning: cpu usage is high 85% | user=1;idle=2");
    }

    #[test]
    fn below_warning_is_ok() {
        let eval = evaluate(MetricKind::Cpu, &sample(0.5), cpu_thresholds()).expect("evaluated");
        assert_eq!(eval.severity, Severity::Ok);
        assert_eq!(eval.message, "OK: cpu usage is 50% | user=1;idle=2");
    }

    #[test]
    fn above_critical_is_critical() {
        let eval = evaluate(MetricKind::Cpu, &sample(0.95), cpu_thresholds()).expect("evaluated");
        assert_eq!(eval.severity, Severity::Critical);
        assert_eq!(eval.message, "Critical: cpu usage is critical 95% | user=1;idle=2");
    }

    #[test]
    fn inverted_thresholds_warn_regardless_of_level() {
        let inverted = Thresholds {
            warning: Some(0.9),
            critical: Some(0.8),
        };
        for level in [0.0, 0.85, 5.0] {
            let eval = evaluate(MetricKind::Cpu, &sample(level), inverted).expect("evaluated");
            assert_eq!(eval.severity, Severity::Warning);
            assert_eq!(
                eval.message,
                "Warning: warn (0.9) > crit (0.8) for cpu | user=1;idle=2"
            );
        }
    }

    #[test]
    fn level_on_warning_boundary_falls_through_to_unknown() {
        let eval = evaluate(MetricKind::Cpu, &sample(0.8), cpu_thresholds()).expect("evaluated");
        assert_eq!(eval.severity, Severity::Unknown);
        assert_eq!(eval.message, "Unknown: no conditions were metuser=1;idle=2");
    }

    #[test]
    fn defaults_fill_missing_thresholds() {
        let eval = evaluate(MetricKind::Memory, &sample(0.92), Thresholds::default())
            .expect("evaluated");
        assert_eq!(eval.severity, Severity::Warning);

        let eval = evaluate(MetricKind::Load, &sample(2.5), Thresholds::default())
            .expect("evaluated");
        assert_eq!(eval.severity, Severity::Critical);
        assert_eq!(eval.message, "Critical: load usage is critical 2.5 | user=1;idle=2");
    }

    #[test]
    fn disk_text_detail_is_passed_through() {
        let disk = MetricSample {
            level: 16.0,
            detail: Detail::Text("mb_in=8;mb_out=8".to_string()),
        };
        let eval = evaluate(MetricKind::Disk, &disk, Thresholds::default()).expect("evaluated");
        assert_eq!(eval.severity, Severity::Warning);
        assert_eq!(eval.message, "Warning: disk usage is high 16MB/s | mb_in=8;mb_out=8");
    }

    #[test]
    fn evaluation_is_repeatable() {
        let s = sample(0.85);
        let first = evaluate(MetricKind::Cpu, &s, cpu_thresholds()).expect("evaluated");
        let second = evaluate(MetricKind::Cpu, &s, cpu_thresholds()).expect("evaluated");
        assert_eq!(first, second);
    }

    #[test]
    fn metrics_without_defaults_need_thresholds() {
        let err = evaluate(MetricKind::Network, &sample(1.0), Thresholds::default())
            .expect_err("no defaults for network");
        assert!(matches!(err, CheckError::NotImplemented(MetricKind::Network)));
    }

    #[test]
    fn general_format_matches_printf() {
        assert_eq!(format_general(85.0, 2), "85");
        assert_eq!(format_general(0.25, 2), "0.25");
        assert_eq!(format_general(0.15625, 2), "0.16");
        assert_eq!(format_general(100.0, 2), "1e+02");
        assert_eq!(format_general(123.4, 2), "1.2e+02");
        assert_eq!(format_general(0.00001234, 2), "1.2e-05");
        assert_eq!(format_general(0.0001234, 2), "0.00012");
        assert_eq!(format_general(3.0, 2), "3");
        assert_eq!(format_general(0.0, 2), "0");
        assert_eq!(format_general(-2.5, 2), "-2.5");
        assert_eq!(format_general(f64::NAN, 2), "nan");
    }

    #[test]
    fn whole_thresholds_keep_a_decimal_place() {
        let thresholds = Thresholds {
            warning: Some(10.0),
            critical: Some(5.0),
        };
        let eval = evaluate(MetricKind::Load, &sample(0.5), thresholds).expect("evaluated");
        assert_eq!(eval.severity, Severity::Warning);
        assert!(eval.message.starts_with("Warning: warn (10.0) > crit (5.0) for load | "));
    }

    #[test]
    fn decimal_format_matches_float_repr() {
        assert_eq!(format_decimal(30.0), "30.0");
        assert_eq!(format_decimal(0.05), "0.05");
        assert_eq!(format_decimal(2.5), "2.5");
        assert_eq!(format_decimal(-1.0), "-1.0");
    }
}
