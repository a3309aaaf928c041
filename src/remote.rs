//! Remote command dispatch.
//!
//! A check runs exactly one command line on the local shell, which in turn
//! logs into the target host and runs the metric's fixed command sequence.

use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::model::{MetricKind, RawResult};
use crate::timeout::TimeoutGuard;
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

const LOAD_COMMAND: &[&str] = &[
    "/bin/cat",
    "/proc/loadavg",
    "&&",
    "/bin/cat",
    "/proc/cpuinfo",
    "|",
    "/bin/grep",
    "'model name'",
    "|",
    "wc",
    "-l",
];
const MEMORY_COMMAND: &[&str] = &["/usr/bin/free", "-m"];
const CPU_COMMAND: &[&str] = &[
    "/bin/cat",
    "/proc/stat",
    "&&",
    "/bin/sleep",
    "1",
    "&&",
    "/bin/cat",
    "/proc/stat",
];
const DISK_COMMAND: &[&str] = &["/usr/bin/vmstat", "10", "2"];

/// Tokens run on the remote host for `metric`; these must reach the remote
/// shell unchanged since the parsers depend on their exact output.
pub fn remote_command(metric: MetricKind) -> Option<&'static [&'static str]> {
    match metric {
        MetricKind::Load => Some(LOAD_COMMAND),
        MetricKind::Memory => Some(MEMORY_COMMAND),
        MetricKind::Cpu => Some(CPU_COMMAND),
        MetricKind::Disk => Some(DISK_COMMAND),
        MetricKind::Filesystem | MetricKind::Network => None,
    }
}

pub fn build_command_line(config: &CheckConfig, remote: &[&str]) -> String {
    let mut parts: Vec<String> = vec![config.binary.clone()];
    if let Some(key) = &config.key {
        parts.push("-i".to_string());
        parts.push(key.clone());
    }

    // The port is glued onto the host text as-is.
    let mut host = config.hostname.clone();
    if let Some(port) = config.port {
        host.push_str(&port.to_string());
    }
    parts.push(format!("{}@{}", config.logname, host));

    parts.push("\"".to_string());
    parts.extend(remote.iter().map(|t| t.to_string()));
    parts.push("\"".to_string());
    parts.join(" ")
}

pub trait Transport {
    fn spawn(&self, command_line: &str) -> io::Result<Box<dyn RemoteProcess>>;
}

#[async_trait]
pub trait RemoteProcess: Send {
    /// Non-blocking completion probe.
    fn try_exit_status(&mut self) -> io::Result<Option<i32>>;

    fn terminate(&mut self);

    async fn into_output(self: Box<Self>, exit_status: i32) -> io::Result<RawResult>;
}

/// Runs the command line through `/bin/sh -c`.
#[derive(Debug, Clone)]
pub struct ShellTransport {
    shell: String,
}

impl Default for ShellTransport {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }
}

impl Transport for ShellTransport {
    fn spawn(&self, command_line: &str) -> io::Result<Box<dyn RemoteProcess>> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        Ok(Box::new(ShellProcess {
            child,
            stdout,
            stderr,
        }))
    }
}

struct ShellProcess {
    child: Child,
    stdout: JoinHandle<io::Result<Vec<u8>>>,
    stderr: JoinHandle<io::Result<Vec<u8>>>,
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn join_output(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle.await.map_err(io::Error::other)?
}

#[async_trait]
impl RemoteProcess for ShellProcess {
    fn try_exit_status(&mut self) -> io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    fn terminate(&mut self) {
        if let Err(err) = self.child.start_kill() {
            debug!(error = %err, "remote command already gone");
        }
    }

    async fn into_output(self: Box<Self>, exit_status: i32) -> io::Result<RawResult> {
        let ShellProcess { stdout, stderr, .. } = *self;
        Ok(RawResult {
            exit_status,
            stdout: join_output(stdout).await?,
            stderr: join_output(stderr).await?,
        })
    }
}

/// Dispatches the metric's command and polls it to completion under `guard`.
pub async fn execute(
    transport: &dyn Transport,
    config: &CheckConfig,
    guard: &TimeoutGuard,
    poll_interval: Duration,
) -> Result<RawResult, CheckError> {
    let remote = remote_command(config.metric).ok_or(CheckError::NotImplemented(config.metric))?;
    let command_line = build_command_line(config, remote);
    if config.verbose {
        info!(command = %command_line, "about to run remote command");
    }

    debug!(
        poll_interval_ms = poll_interval.as_millis() as u64,
        remaining_ms = guard.remaining().as_millis() as u64,
        "dispatching remote command"
    );
    let mut process = transport.spawn(&command_line).map_err(CheckError::Spawn)?;
    let exit_status = loop {
        if let Some(status) = process.try_exit_status().map_err(CheckError::Wait)? {
            break status;
        }
        guard.check("waiting for remote command", Some(process.as_mut()))?;
        time::sleep(poll_interval).await;
    };

    // Pipes can outlive the shell when a descendant inherits them.
    let raw = match time::timeout(guard.remaining(), process.into_output(exit_status)).await {
        Ok(output) => output.map_err(CheckError::Output)?,
        Err(_) => {
            warn!(
                exit_status,
                elapsed_ms = guard.elapsed().as_millis() as u64,
                "remote output still open at deadline"
            );
            return Err(CheckError::Timeout {
                phase: "reading remote output".to_string(),
                timeout: guard.timeout(),
            });
        }
    };
    debug!(
        exit_status,
        stdout_bytes = raw.stdout.len(),
        stderr_bytes = raw.stderr.len(),
        elapsed_ms = guard.elapsed().as_millis() as u64,
        "remote command finished"
    );
    Ok(raw)
}
