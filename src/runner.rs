use crate::collectors::parser_for;
use crate::config::CheckConfig;
use crate::error::{one_line, CheckError};
use crate::model::Evaluation;
use crate::remote::{self, Transport};
use crate::thresholds::evaluate;
use crate::timeout::TimeoutGuard;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Runs one check end to end: dispatch, parse, evaluate.
pub struct CheckRunner<T> {
    transport: T,
    config: CheckConfig,
    guard: TimeoutGuard,
}

impl<T: Transport> CheckRunner<T> {
    pub fn new(transport: T, config: CheckConfig, started_at: Instant) -> Self {
        let guard = TimeoutGuard::new(started_at, config.timeout);
        Self {
            transport,
            config,
            guard,
        }
    }

    pub async fn run(&self) -> Evaluation {
        match self.try_run().await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(
                    metric = %self.config.metric,
                    host = %self.config.hostname,
                    error = %err,
                    "check failed"
                );
                err.into_evaluation()
            }
        }
    }

    async fn try_run(&self) -> Result<Evaluation, CheckError> {
        let metric = self.config.metric;
        let parser = parser_for(metric, self.config.block_size)?;

        let raw = remote::execute(
            &self.transport,
            &self.config,
            &self.guard,
            self.config.poll_interval(),
        )
        .await?;
        self.guard.check("remote command returned", None)?;
        if raw.exit_status != 0 {
            return Err(CheckError::Transport {
                status: raw.exit_status,
                stdout: one_line(&raw.stdout),
                stderr: one_line(&raw.stderr),
            });
        }

        let sample = parser.parse(&raw)?;
        self.guard.check("parsing output", None)?;
        if self.config.verbose {
            match serde_json::to_string(&sample) {
                Ok(json) => debug!(%metric, sample = %json, "parsed sample"),
                Err(err) => debug!(%metric, error = %err, "could not serialize sample"),
            }
        }

        evaluate(metric, &sample, self.config.thresholds)
    }
}
