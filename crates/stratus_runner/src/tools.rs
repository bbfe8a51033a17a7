//! Startup checks for the external tools the processor shells out to.

use tracing::{info, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::runner::CommandRunner;

/// Outcome of probing the configured tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolReport {
    pub available: Vec<String>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl ToolReport {
    pub fn is_ready(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Fail if any required tool is missing.
    pub fn ensure_ready(&self) -> RunnerResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RunnerError::ToolNotAvailable(self.missing_required.join(", ")))
        }
    }
}

/// Required/optional tool split used before a sweep.
#[derive(Debug, Clone, Default)]
pub struct ToolCheck {
    required: Vec<String>,
    optional: Vec<String>,
}

impl ToolCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, tool: impl Into<String>) -> Self {
        self.required.push(tool.into());
        self
    }

    pub fn optional(mut self, tool: impl Into<String>) -> Self {
        self.optional.push(tool.into());
        self
    }

    pub fn with_tools(mut self, required: &[String], optional: &[String]) -> Self {
        self.required.extend(required.iter().cloned());
        self.optional.extend(optional.iter().cloned());
        self
    }

    /// Check every tool. Missing optional tools are logged as warnings.
    pub async fn run(&self, runner: &dyn CommandRunner) -> RunnerResult<ToolReport> {
        let mut report = ToolReport::default();

        for tool in &self.required {
            if runner.is_available(tool).await? {
                report.available.push(tool.clone());
            } else {
                report.missing_required.push(tool.clone());
            }
        }

        for tool in &self.optional {
            if runner.is_available(tool).await? {
                report.available.push(tool.clone());
            } else {
                warn!("Optional tool '{}' not found; continuing without it", tool);
                report.missing_optional.push(tool.clone());
            }
        }

        if report.is_ready() {
            info!("Tool check passed: {}", report.available.join(", "));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    #[tokio::test]
    async fn test_missing_optional_tool_is_not_fatal() {
        let runner = MockRunner::new().set_missing("aws");
        let report = ToolCheck::new()
            .require("terraform")
            .optional("aws")
            .run(&runner)
            .await
            .unwrap();

        assert!(report.is_ready());
        assert!(report.ensure_ready().is_ok());
        assert_eq!(report.missing_optional, vec!["aws".to_string()]);
        assert_eq!(report.available, vec!["terraform".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_required_tool_is_fatal() {
        let runner = MockRunner::new().set_missing("terraform");
        let report = ToolCheck::new()
            .with_tools(&["terraform".to_string()], &["aws".to_string()])
            .run(&runner)
            .await
            .unwrap();

        assert!(!report.is_ready());
        let err = report.ensure_ready().unwrap_err();
        assert!(err.to_string().contains("terraform"));
    }
}
