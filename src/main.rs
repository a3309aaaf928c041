mod collectors;
mod config;
mod error;
mod model;
mod remote;
mod runner;
mod thresholds;
mod timeout;

use clap::error::ErrorKind;
use clap::Parser;
use config::{CheckConfig, CheckOptions, Settings};
use error::CheckError;
use model::{Evaluation, Severity};
use remote::ShellTransport;
use runner::CheckRunner;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Runs a single health check on a remote host over ssh and reports it
/// the way monitoring plugins do: one status line and an exit code.
#[derive(Parser, Debug)]
#[command(name = "sshcheck")]
#[command(version)]
struct Cli {
    /// Optional YAML settings file with connection defaults and thresholds
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print an example settings file and exit
    #[arg(long)]
    print_default_config: bool,
    #[command(flatten)]
    check: CheckOptions,
}

#[tokio::main]
async fn main() {
    let started_at = Instant::now();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprint!("{err}");
            finish(argument_error(&err));
        }
    };

    init_tracing(cli.check.verbose);

    if cli.print_default_config {
        println!("{}", Settings::example_yaml());
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "could not build check configuration");
            finish(err.into_evaluation());
        }
    };
    debug!(?config, "check configuration");

    let evaluation = CheckRunner::new(ShellTransport::default(), config, started_at)
        .run()
        .await;
    finish(evaluation);
}

fn load_config(cli: &Cli) -> Result<CheckConfig, CheckError> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::default(),
    };
    Ok(CheckConfig::resolve(&cli.check, &settings)?)
}

/// Bad arguments are reported as UNKNOWN, not with clap's usage exit code.
fn argument_error(err: &clap::Error) -> Evaluation {
    let rendered = err.to_string();
    let reason = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ");
    Evaluation {
        severity: Severity::Unknown,
        message: format!("Unknown: invalid arguments: {reason}"),
    }
}

/// Prints the plugin line and exits with the severity's code.
fn finish(evaluation: Evaluation) -> ! {
    println!("{evaluation}");
    std::process::exit(evaluation.severity.exit_code());
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKind;

    #[test]
    fn cli_accepts_short_flags() {
        let cli = Cli::try_parse_from([
            "sshcheck", "-i", "memory", "-H", "db1", "-t", "12.5", "-w", "0.7", "-c", "0.8",
            "-l", "nagios", "-k", "/tmp/key", "-p", "2222", "-v",
        ])
        .expect("valid arguments");
        assert_eq!(cli.check.information, MetricKind::Memory);
        assert_eq!(cli.check.hostname.as_deref(), Some("db1"));
        assert_eq!(cli.check.timeout, Some(12.5));
        assert_eq!(cli.check.warning, Some(0.7));
        assert_eq!(cli.check.critical, Some(0.8));
        assert_eq!(cli.check.port, Some(2222));
        assert!(cli.check.verbose);
    }

    #[test]
    fn cli_defaults_to_load() {
        let cli = Cli::try_parse_from(["sshcheck"]).expect("no arguments needed");
        assert_eq!(cli.check.information, MetricKind::Load);
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_rejects_unknown_metric() {
        let err = Cli::try_parse_from(["sshcheck", "-i", "swap"]).expect_err("invalid metric");
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn argument_errors_are_unknown() {
        let err = Cli::try_parse_from(["sshcheck", "-i", "swap"]).expect_err("invalid metric");
        let eval = argument_error(&err);
        assert_eq!(eval.severity, Severity::Unknown);
        assert_eq!(eval.severity.exit_code(), 3);
        assert!(eval.message.starts_with("Unknown: invalid arguments: "));
        assert!(eval.message.contains("swap"));
        assert!(!eval.message.contains('\n'));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
