//! Process-backed command runner.
//!
//! Spawns the requested program with `tokio::process`, captures its output
//! line by line and enforces the per-call deadline from [`RunConfig`].

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{CommandSpec, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Deadline for the `--version` call made by availability checks.
const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Command runner that executes real processes.
#[derive(Debug, Clone, Default)]
pub struct CliRunner;

impl CliRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

async fn collect_lines<R>(reader: R, stream: &'static str, stream_logs: bool, program: String) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if stream_logs {
            debug!(program = %program, stream, "{}", line);
        }
        output.push_str(&line);
        output.push('\n');
    }
    output
}

#[async_trait]
impl CommandRunner for CliRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        let mut check = Command::new(program);
        check
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(CHECK_TIMEOUT, check.status()).await {
            Ok(Ok(status)) => Ok(status.success()),
            Ok(Err(e)) => {
                debug!("{} is not executable: {}", program, e);
                Ok(false)
            }
            Err(_) => {
                warn!("{} --version did not answer within {:?}", program, CHECK_TIMEOUT);
                Ok(false)
            }
        }
    }

    async fn run(&self, spec: &CommandSpec, run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        debug!("Executing: {}", spec.display());

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = Self::build_command(spec)
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed {
                program: spec.program.clone(),
                message: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stdout_task = tokio::spawn(collect_lines(
            stdout,
            "stdout",
            run_config.stream_logs,
            spec.program.clone(),
        ));
        let stderr_task = tokio::spawn(collect_lines(
            stderr,
            "stderr",
            run_config.stream_logs,
            spec.program.clone(),
        ));

        let status = match run_config.timeout_secs {
            Some(seconds) => match tokio::time::timeout(Duration::from_secs(seconds), child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("{} exceeded {}s, killing it", spec.display(), seconds);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", spec.program, e);
                    }
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(RunnerError::Timeout {
                        program: spec.program.clone(),
                        seconds,
                    });
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecutionResult {
            exit_code: status.code().map(i64::from).unwrap_or(-1),
            stdout,
            stderr,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
