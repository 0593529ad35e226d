use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// The agent-invocation collaborator failed (CLI missing, non-zero exit,
    /// empty output).
    #[error("Agent invocation failed: {0}")]
    Upstream(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Agent timed out after {0} seconds")]
    Timeout(u64),

    #[error("Graph configuration error: {0}")]
    Config(String),

    #[error("Event stream closed by client")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether this error originated in the agent-invocation collaborator.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AgentError::Upstream(_) | AgentError::Timeout(_))
    }
}
