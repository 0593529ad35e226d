//! Process wrapper for the `claude` command-line client. Every graph node
//! call is one non-interactive `claude -p` run.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

pub const DEFAULT_PROGRAM: &str = "claude";

/// Where and how to run one node call.
#[derive(Debug, Clone, PartialEq)]
pub struct CliCall {
    pub program: String,
    pub model: String,
    pub timeout: Duration,
}

impl CliCall {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            model: model.into(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args<'a>(&'a self, system_prompt: &'a str, input: &'a str) -> [&'a str; 8] {
        [
            "-p",
            input,
            "--system-prompt",
            system_prompt,
            "--model",
            self.model.as_str(),
            "--output-format",
            "text",
        ]
    }
}

/// Run one node call and return its report text, trailing whitespace
/// trimmed. Every failure of the CLI itself is an upstream error.
///
/// The child is killed if the timeout fires or the calling future is dropped.
pub async fn invoke_claude(
    call: &CliCall,
    system_prompt: &str,
    input: &str,
) -> Result<String, AgentError> {
    debug!(program = %call.program, model = %call.model, input_len = input.len(), "Running agent CLI");

    let output = tokio::time::timeout(
        call.timeout,
        Command::new(&call.program)
            .args(call.args(system_prompt, input))
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| AgentError::Timeout(call.timeout.as_secs()))?
    .map_err(|e| AgentError::Upstream(format!("failed to spawn {}: {e}", call.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(program = %call.program, status = %output.status, stderr = %stderr.trim(), "Agent CLI failed");
        return Err(AgentError::Upstream(format!(
            "{} exited {}: {}",
            call.program,
            output.status,
            stderr.trim()
        )));
    }

    let report = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if report.trim().is_empty() {
        return Err(AgentError::Upstream(format!(
            "{} returned an empty report",
            call.program
        )));
    }
    Ok(report)
}

/// Whether `program --version` runs successfully.
pub async fn check_cli_available(program: &str) -> bool {
    match Command::new(program).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
