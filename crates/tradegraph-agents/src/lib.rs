pub mod bridge;
pub mod claude_cli;
pub mod error;
pub mod graph;
pub mod invoker;
pub mod parser;
pub mod prompts;
pub mod resource;
pub mod sink;

pub mod test_support;

pub use bridge::{run_isolated, run_isolated_blocking, BridgeError};
pub use error::AgentError;
pub use graph::{run_analysis, AnalysisGraph, GraphFactory, GraphOutcome};
pub use invoker::{AgentInvoker, AgentSpec, ClaudeCliInvoker};
pub use parser::{extract_decision, Decision};
pub use prompts::AgentRole;
pub use resource::{GraphHandle, GraphStatus, InitError, ResourceFactory, ResourceManager};
pub use sink::EventSink;

/// The process-wide manager for the shared analysis graph.
pub type GraphManager = ResourceManager<AnalysisGraph>;
