use std::time::Duration;

use async_trait::async_trait;

use crate::claude_cli::{invoke_claude, CliCall, DEFAULT_PROGRAM};
use crate::error::AgentError;
use crate::prompts::AgentRole;

/// Everything needed to invoke one graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    /// Node name, unique within a graph. Used as the message author.
    pub name: String,
    pub role: AgentRole,
    pub model: String,
    pub system_prompt: String,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, role: AgentRole, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            model: model.into(),
            system_prompt: role.system_prompt(),
        }
    }
}

/// Agent reasoning collaborator. Mockable for testing.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, spec: &AgentSpec, input: &str) -> Result<String, AgentError>;
}

/// An invoker that shells out to the Claude CLI, one process per node call.
pub struct ClaudeCliInvoker {
    pub program: String,
    pub timeout: Duration,
}

impl ClaudeCliInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl AgentInvoker for ClaudeCliInvoker {
    async fn invoke(&self, spec: &AgentSpec, input: &str) -> Result<String, AgentError> {
        let call = CliCall::new(&spec.model, self.timeout).with_program(&self.program);
        invoke_claude(&call, &spec.system_prompt, input).await
    }
}
