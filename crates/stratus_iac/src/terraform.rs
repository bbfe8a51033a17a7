//! Terraform runner and the Terraform-backed provisioning engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use stratus_core::{Action, TFVARS_FILE};
use stratus_runner::{CommandRunner, CommandSpec, RunConfig};

use crate::engine::{ProvisioningEngine, Stage, StageError};
use crate::error::IacResult;

/// Saved plan artifact inside an instance.
pub const PLAN_FILE: &str = "tfplan";

/// Local state file inside an instance.
pub const STATE_FILE: &str = "terraform.tfstate";

/// Captured outputs inside an instance.
pub const OUTPUTS_FILE: &str = "outputs.json";

/// Longest failure message kept in a terminal record.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Result of a Terraform operation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub stdout: String,
    pub failure: String,
    pub exit_code: i64,
}

/// Terraform runner that executes commands through a [`CommandRunner`].
pub struct TerraformRunner {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    timeout_secs: Option<u64>,
}

impl TerraformRunner {
    /// Create a new Terraform runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: "terraform".to_string(),
            timeout_secs: None,
        }
    }

    /// Use a different Terraform executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Deadline applied to every command.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run terraform init.
    pub async fn init(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform init in {:?}", working_dir);
        self.run_command(working_dir, &["init", "-input=false", "-no-color"]).await
    }

    /// Run terraform validate.
    pub async fn validate(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform validate in {:?}", working_dir);
        self.run_command(working_dir, &["validate", "-no-color"]).await
    }

    /// Run terraform plan, saving the plan to [`PLAN_FILE`]. A destroy
    /// action saves a teardown plan.
    pub async fn plan(&self, working_dir: &Path, action: Action) -> IacResult<TerraformResult> {
        info!("Running terraform plan ({}) in {:?}", action, working_dir);
        let out = format!("-out={}", PLAN_FILE);
        let var_file = format!("-var-file={}", TFVARS_FILE);
        let mut args = vec!["plan", "-input=false", "-no-color"];
        if action.is_destroy() {
            args.push("-destroy");
        }
        if working_dir.join(TFVARS_FILE).exists() {
            args.push(&var_file);
        }
        args.push(&out);
        self.run_command(working_dir, &args).await
    }

    /// Apply exactly the saved plan.
    pub async fn apply(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform apply in {:?}", working_dir);
        self.run_command(
            working_dir,
            &["apply", "-input=false", "-no-color", "-auto-approve", PLAN_FILE],
        )
        .await
    }

    /// Read the declared outputs as JSON.
    pub async fn output(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        debug!("Running terraform output in {:?}", working_dir);
        self.run_command(working_dir, &["output", "-json", "-no-color"]).await
    }

    async fn run_command(&self, working_dir: &Path, args: &[&str]) -> IacResult<TerraformResult> {
        let spec = CommandSpec::new(&self.binary)
            .args(args.iter().copied())
            .workdir(working_dir)
            .env("TF_IN_AUTOMATION", "true")
            .env("TF_INPUT", "0");

        let mut run_config = RunConfig::default();
        if let Some(seconds) = self.timeout_secs {
            run_config = run_config.timeout(seconds);
        }

        debug!("Executing terraform {:?}", args);

        let result = self.runner.run(&spec, &run_config).await?;

        Ok(TerraformResult {
            success: result.success(),
            stdout: result.stdout.clone(),
            failure: result.failure_detail(),
            exit_code: result.exit_code,
        })
    }
}

/// Provisioning engine backed by the Terraform CLI.
pub struct TerraformEngine {
    runner: TerraformRunner,
}

impl TerraformEngine {
    pub fn new(runner: TerraformRunner) -> Self {
        Self { runner }
    }

    fn gate(stage: Stage, result: IacResult<TerraformResult>) -> Result<TerraformResult, StageError> {
        match result {
            Ok(r) if r.success => Ok(r),
            Ok(r) => {
                debug!("terraform {} exited with code {}", stage, r.exit_code);
                Err(StageError::new(stage, truncate(&r.failure)))
            }
            Err(e) => Err(StageError::new(stage, truncate(&e.to_string()))),
        }
    }

    /// Never fails: anything short of a JSON object yields `{}`.
    async fn capture_outputs(&self, instance_dir: &Path) -> Value {
        let outputs = match self.runner.output(instance_dir).await {
            Ok(r) if r.success => parse_outputs(&r.stdout),
            Ok(r) => {
                warn!("terraform output failed in {:?}: {}", instance_dir, r.failure);
                None
            }
            Err(e) => {
                warn!("terraform output could not run in {:?}: {}", instance_dir, e);
                None
            }
        }
        .unwrap_or_else(|| Value::Object(Map::new()));

        match serde_json::to_string_pretty(&outputs) {
            Ok(content) => {
                if let Err(e) = fs::write(instance_dir.join(OUTPUTS_FILE), content) {
                    warn!("Failed to write {} in {:?}: {}", OUTPUTS_FILE, instance_dir, e);
                }
            }
            Err(e) => warn!("Failed to serialize outputs: {}", e),
        }

        outputs
    }
}

#[async_trait]
impl ProvisioningEngine for TerraformEngine {
    async fn apply(&self, instance_dir: &Path, action: Action) -> Result<Value, StageError> {
        Self::gate(Stage::Init, self.runner.init(instance_dir).await)?;
        Self::gate(Stage::Validate, self.runner.validate(instance_dir).await)?;
        Self::gate(Stage::Plan, self.runner.plan(instance_dir, action).await)?;
        Self::gate(Stage::Apply, self.runner.apply(instance_dir).await)?;

        let outputs = self.capture_outputs(instance_dir).await;
        info!("Finished {} of {:?}", action, instance_dir);
        Ok(outputs)
    }
}

fn parse_outputs(stdout: &str) -> Option<Value> {
    if stdout.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(stdout) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            warn!("terraform output did not return an object");
            None
        }
        Err(e) => {
            warn!("Failed to parse terraform outputs: {}", e);
            None
        }
    }
}

fn truncate(message: &str) -> String {
    let message = message.trim();
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_runner::{MockResponse, MockRunner};
    use tempfile::tempdir;

    fn engine(mock: &MockRunner) -> TerraformEngine {
        TerraformEngine::new(TerraformRunner::new(Arc::new(mock.clone())).with_timeout(60))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new()
            .respond_to("output", MockResponse::success(r#"{"url": {"value": "https://blog.example.com"}}"#));

        let outputs = engine(&mock).apply(dir.path(), Action::Create).await.unwrap();

        assert_eq!(outputs["url"]["value"], "https://blog.example.com");
        assert_eq!(mock.subcommands(), vec!["init", "validate", "plan", "apply", "output"]);
        assert!(dir.path().join(OUTPUTS_FILE).exists());
    }

    #[tokio::test]
    async fn test_apply_uses_saved_plan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TFVARS_FILE), "{}").unwrap();
        let mock = MockRunner::new();

        engine(&mock).apply(dir.path(), Action::Create).await.unwrap();

        let calls = mock.get_method_calls("run");
        let plan = calls.iter().find(|c| c.subcommand() == Some("plan")).unwrap();
        assert!(plan.args.contains(&"-out=tfplan".to_string()));
        assert!(plan.args.contains(&"-var-file=terraform.tfvars.json".to_string()));

        let apply = calls.iter().find(|c| c.subcommand() == Some("apply")).unwrap();
        assert_eq!(apply.args.last().map(String::as_str), Some(PLAN_FILE));
        assert_eq!(apply.workdir.as_deref(), Some(dir.path()));
        assert_eq!(apply.env.get("TF_IN_AUTOMATION").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_create_and_update_never_plan_destroy() {
        for action in [Action::Create, Action::Update] {
            let dir = tempdir().unwrap();
            let mock = MockRunner::new();
            engine(&mock).apply(dir.path(), action).await.unwrap();

            let calls = mock.get_method_calls("run");
            let plan = calls.iter().find(|c| c.subcommand() == Some("plan")).unwrap();
            assert!(!plan.args.contains(&"-destroy".to_string()));
        }
    }

    #[tokio::test]
    async fn test_destroy_plan_failure_is_tagged_plan() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().respond_to("plan", MockResponse::failure(1, "Error: state locked"));

        let err = engine(&mock).apply(dir.path(), Action::Destroy).await.unwrap_err();

        assert_eq!(err.stage, Stage::Plan);
        let plan = &mock.get_method_calls("run")[2];
        assert_eq!(plan.args[..4], ["plan", "-input=false", "-no-color", "-destroy"]);
    }

    #[tokio::test]
    async fn test_plan_failure_stops_sequence() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().respond_to("plan", MockResponse::failure(1, "Error: missing variable"));

        let err = engine(&mock).apply(dir.path(), Action::Create).await.unwrap_err();

        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.message, "Error: missing variable");
        assert_eq!(mock.subcommands(), vec!["init", "validate", "plan"]);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_stage_failure() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().respond_to("init", MockResponse::success("").with_duration(120_000));

        let err = engine(&mock).apply(dir.path(), Action::Create).await.unwrap_err();
        assert_eq!(err.stage, Stage::Init);
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_output_failure_yields_empty_object() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().respond_to("output", MockResponse::failure(1, "no state"));

        let outputs = engine(&mock).apply(dir.path(), Action::Create).await.unwrap();
        assert_eq!(outputs, serde_json::json!({}));
    }

    #[test]
    fn test_parse_outputs_rejects_non_objects() {
        assert!(parse_outputs("").is_none());
        assert!(parse_outputs("not json").is_none());
        assert!(parse_outputs("[1]").is_none());
        assert!(parse_outputs("{}").is_some());
    }

    #[test]
    fn test_truncate_long_messages() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_MESSAGE_CHARS + 3);
        assert_eq!(truncate("  short \n"), "short");
    }
}
