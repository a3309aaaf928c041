use crate::error::CheckError;
use crate::remote::RemoteProcess;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Wall-clock deadline for a whole check run.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    started_at: Instant,
    timeout: Duration,
}

impl TimeoutGuard {
    pub fn new(started_at: Instant, timeout: Duration) -> Self {
        Self {
            started_at,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.timeout
    }

    /// Fails the run once the deadline has passed, killing `process` first.
    pub fn check(
        &self,
        phase: &str,
        process: Option<&mut dyn RemoteProcess>,
    ) -> Result<(), CheckError> {
        if !self.is_expired() {
            return Ok(());
        }

        if let Some(process) = process {
            process.terminate();
        }
        warn!(
            phase,
            timeout_secs = self.timeout.as_secs_f64(),
            elapsed_secs = self.elapsed().as_secs_f64(),
            "check deadline exceeded"
        );
        Err(CheckError::Timeout {
            phase: phase.to_string(),
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawResult;
    use async_trait::async_trait;
    use std::io;

    #[derive(Default)]
    struct Recorder {
        terminated: bool,
    }

    #[async_trait]
    impl RemoteProcess for Recorder {
        fn try_exit_status(&mut self) -> io::Result<Option<i32>> {
            Ok(None)
        }

        fn terminate(&mut self) {
            self.terminated = true;
        }

        async fn into_output(self: Box<Self>, exit_status: i32) -> io::Result<RawResult> {
            Ok(RawResult {
                exit_status,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }

    #[test]
    fn passes_before_deadline() {
        let guard = TimeoutGuard::new(Instant::now(), Duration::from_secs(60));
        let mut process = Recorder::default();
        guard
            .check("setup", Some(&mut process))
            .expect("deadline is far away");
        assert!(!process.terminated);
        assert!(guard.remaining() > Duration::from_secs(50));
    }

    #[test]
    fn expired_guard_terminates_process() {
        let started = Instant::now() - Duration::from_secs(5);
        let guard = TimeoutGuard::new(started, Duration::from_secs(1));
        let mut process = Recorder::default();
        let err = guard
            .check("waiting for remote command", Some(&mut process))
            .expect_err("deadline passed");
        assert!(process.terminated);
        assert!(matches!(err, CheckError::Timeout { ref phase, .. } if phase == "waiting for remote command"));
        assert_eq!(guard.remaining(), Duration::ZERO);
    }

    #[test]
    fn expired_guard_without_process() {
        let started = Instant::now() - Duration::from_secs(5);
        let guard = TimeoutGuard::new(started, Duration::from_secs(1));
        let err = guard.check("parsing output", None).expect_err("deadline passed");
        assert_eq!(err.to_string(), "timeout after parsing output (1.0s)");
    }
}
