use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;

/// Result of one isolated dataset execution. Failures are data, not errors:
/// the orchestrator records them and moves on to the next dataset.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub elapsed: Duration,
    pub detail: Option<String>,
}

impl RunOutcome {
    fn failure(elapsed: Duration, detail: String) -> Self {
        Self {
            success: false,
            elapsed,
            detail: Some(detail),
        }
    }
}

#[async_trait]
pub trait DatasetRunner: Send + Sync {
    /// Processes one dataset to completion, bounded by a wall-clock budget.
    async fn run(&self, code: &str) -> RunOutcome;
}

/// Runs each dataset in its own OS process so that unbounded memory growth
/// or a hang while decoding one dataset cannot take down the orchestrator or
/// corrupt state already committed for other datasets.
pub struct SubprocessRunner {
    binary: PathBuf,
    timeout: Duration,
}

const WORKER_BINARY_NAME: &str = "process-dataset";

impl SubprocessRunner {
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let binary = match &config.worker_binary {
            Some(path) => path.clone(),
            None => {
                // The worker ships as a sibling binary of the orchestrator.
                let exe = std::env::current_exe()?;
                exe.parent()
                    .map(|dir| dir.join(WORKER_BINARY_NAME))
                    .ok_or_else(|| ConnectorError::Config {
                        message: "Cannot locate the process-dataset binary".to_string(),
                    })?
            }
        };
        Ok(Self {
            binary,
            timeout: config.worker_timeout,
        })
    }

    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl DatasetRunner for SubprocessRunner {
    async fn run(&self, code: &str) -> RunOutcome {
        let start = Instant::now();

        let child = Command::new(&self.binary)
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(err) => {
                return RunOutcome::failure(
                    start.elapsed(),
                    format!("failed to spawn {}: {}", self.binary.display(), err),
                );
            }
        };

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                for line in stdout.lines() {
                    info!("[{}] {}", code, line);
                }

                if output.status.success() {
                    RunOutcome {
                        success: true,
                        elapsed: start.elapsed(),
                        detail: None,
                    }
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    RunOutcome::failure(
                        start.elapsed(),
                        format!(
                            "exit status {}: {}",
                            output.status.code().unwrap_or(-1),
                            stderr.trim()
                        ),
                    )
                }
            }
            Ok(Err(err)) => {
                RunOutcome::failure(start.elapsed(), format!("failed to collect output: {}", err))
            }
            // Dropping the wait future kills the child via kill_on_drop; the
            // unit is abandoned, no partial-state cleanup is needed.
            Err(_) => RunOutcome::failure(
                start.elapsed(),
                format!("timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }
}
