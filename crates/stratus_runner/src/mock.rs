//! Mock command runner for testing.
//!
//! Provides a scriptable implementation of the CommandRunner trait so the
//! provisioning engine and the queue processor can be exercised without
//! Terraform or a cloud account.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{CommandSpec, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Predefined mock response for a command execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }

    /// Simulated run time. A duration longer than the call's timeout makes
    /// the mock report a timeout instead of this response.
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl CapturedCall {
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Mock command runner for testing.
///
/// Responses are chosen in this order: a response registered for the
/// command's subcommand, then the next queued response, then an empty
/// success.
#[derive(Clone)]
pub struct MockRunner {
    /// Programs that report as unavailable.
    missing: Arc<RwLock<HashSet<String>>>,
    /// Responses keyed by subcommand (first argument).
    by_subcommand: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// Queued responses for calls without a subcommand match.
    responses: Arc<RwLock<Vec<MockResponse>>>,
    /// Index of next queued response to return.
    response_index: Arc<AtomicUsize>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Simulated failure to return (as a string message for ExecutionFailed).
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner where every program is available and every
    /// command succeeds with empty output.
    pub fn new() -> Self {
        Self {
            missing: Arc::new(RwLock::new(HashSet::new())),
            by_subcommand: Arc::new(RwLock::new(HashMap::new())),
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Mark a program as not installed.
    pub fn set_missing(self, program: impl Into<String>) -> Self {
        self.missing.write().insert(program.into());
        self
    }

    /// Answer every call whose first argument is `subcommand` with `response`.
    pub fn respond_to(self, subcommand: impl Into<String>, response: MockResponse) -> Self {
        self.by_subcommand.write().insert(subcommand.into(), response);
        self
    }

    /// Add a mock response for the next unmatched call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Set a failure to simulate.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Subcommands of every `run` call, in order.
    pub fn subcommands(&self) -> Vec<String> {
        self.get_method_calls("run")
            .iter()
            .filter_map(|c| c.subcommand().map(String::from))
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self, spec: &CommandSpec) -> MockResponse {
        if let Some(sub) = spec.subcommand() {
            if let Some(response) = self.by_subcommand.read().get(sub) {
                return response.clone();
            }
        }

        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    fn check_failure(&self) -> RunnerResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::ExecutionFailed(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        self.record_call(CapturedCall {
            method: "is_available".to_string(),
            program: program.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            workdir: None,
        });
        Ok(!self.missing.read().contains(program))
    }

    async fn run(&self, spec: &CommandSpec, run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        self.record_call(CapturedCall {
            method: "run".to_string(),
            program: spec.program.clone(),
            args: spec.args.clone(),
            env: spec.env.clone(),
            workdir: spec.workdir.clone(),
        });

        self.check_failure()?;

        if self.missing.read().contains(&spec.program) {
            return Err(RunnerError::SpawnFailed {
                program: spec.program.clone(),
                message: "No such file or directory".to_string(),
            });
        }

        let response = self.next_response(spec);
        if let Some(seconds) = run_config.timeout_secs {
            if response.duration_ms > seconds.saturating_mul(1000) {
                return Err(RunnerError::Timeout {
                    program: spec.program.clone(),
                    seconds,
                });
            }
        }

        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(ExecutionResult {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_basic() {
        let runner = MockRunner::new().add_response(MockResponse::success("test output"));

        let spec = CommandSpec::new("terraform").arg("version");
        let result = runner.run(&spec, &RunConfig::default()).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "test output");
    }

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockRunner::new();

        let spec = CommandSpec::new("terraform")
            .args(["plan", "-out=tfplan"])
            .workdir("/instances/blog")
            .env("TF_IN_AUTOMATION", "true");

        let _ = runner.run(&spec, &RunConfig::default()).await;

        let calls = runner.get_method_calls("run");
        assert_eq!(calls.len(), 1);

        let call = &calls[0];
        assert_eq!(call.program, "terraform");
        assert_eq!(call.subcommand(), Some("plan"));
        assert_eq!(call.workdir, Some(PathBuf::from("/instances/blog")));
        assert_eq!(call.env.get("TF_IN_AUTOMATION").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_mock_runner_subcommand_responses_win() {
        let runner = MockRunner::new()
            .add_response(MockResponse::success("queued"))
            .respond_to("plan", MockResponse::failure(1, "plan broke"));

        let plan = runner
            .run(&CommandSpec::new("terraform").arg("plan"), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(plan.exit_code, 1);
        assert_eq!(plan.stderr, "plan broke");

        let init = runner
            .run(&CommandSpec::new("terraform").arg("init"), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(init.stdout, "queued");
        assert_eq!(runner.subcommands(), vec!["plan".to_string(), "init".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_runner_failure_simulation() {
        let runner = MockRunner::new().simulate_failure("simulated error");

        let result = runner.run(&CommandSpec::new("terraform"), &RunConfig::default()).await;
        assert!(matches!(result, Err(RunnerError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_mock_runner_simulated_timeout() {
        let runner = MockRunner::new().respond_to("apply", MockResponse::success("").with_duration(5_000));

        let spec = CommandSpec::new("terraform").arg("apply");
        let result = runner.run(&spec, &RunConfig::default().timeout(2)).await;
        assert!(matches!(result, Err(RunnerError::Timeout { seconds: 2, .. })));

        let result = runner.run(&spec, &RunConfig::default().timeout(10)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mock_runner_availability() {
        let runner = MockRunner::new().set_missing("aws");
        assert!(runner.is_available("terraform").await.unwrap());
        assert!(!runner.is_available("aws").await.unwrap());

        runner.clear_calls();
        let result = runner.run(&CommandSpec::new("aws"), &RunConfig::default()).await;
        assert!(matches!(result, Err(RunnerError::SpawnFailed { .. })));
        assert_eq!(runner.call_count(), 1);
    }
}
