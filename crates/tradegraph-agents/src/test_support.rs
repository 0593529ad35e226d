//! Scripted collaborators for exercising the graph without the Claude CLI.
//!
//! `ScriptedInvoker` answers each role with a deterministic report built
//! from the request, and can be told to fail at a role or to stall.
//! `CountingFactory` wraps graph construction so tests can observe how many
//! times the shared graph was actually built.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tradegraph_models::GraphConfig;

use crate::error::AgentError;
use crate::graph::{AnalysisGraph, GraphFactory};
use crate::invoker::{AgentInvoker, AgentSpec};
use crate::prompts::AgentRole;
use crate::resource::ResourceFactory;

/// An invoker with canned, role-aware answers.
pub struct ScriptedInvoker {
    decision: String,
    failing_role: Option<AgentRole>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            decision: "BUY".to_string(),
            failing_role: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Decision returned by the risk manager.
    pub fn with_decision(mut self, decision: &str) -> Self {
        self.decision = decision.to_string();
        self
    }

    /// Fail with an upstream error when this role is invoked.
    pub fn failing_at(mut self, role: AgentRole) -> Self {
        self.failing_role = Some(role);
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Node names in invocation order.
    pub fn invoked_nodes(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, spec: &AgentSpec, input: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(spec.name.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing_role == Some(spec.role) {
            return Err(AgentError::Upstream(format!(
                "{} is unavailable",
                spec.name
            )));
        }

        let input: serde_json::Value = serde_json::from_str(input)?;
        let company = input["company"].as_str().unwrap_or("unknown");

        Ok(match spec.role {
            AgentRole::RiskManager => serde_json::json!({
                "decision": self.decision,
                "reasoning": format!("Risk-adjusted view on {company}"),
            })
            .to_string(),
            AgentRole::Trader => format!(
                "Plan for {company}.\nFINAL TRANSACTION PROPOSAL: **{}**",
                self.decision
            ),
            role => format!("{role} report on {company}"),
        })
    }
}

/// Graph config for tests: default pipeline, no CLI check.
pub fn test_graph_config() -> GraphConfig {
    GraphConfig {
        require_cli: false,
        ..GraphConfig::default()
    }
}

/// Build the default pipeline on top of `invoker`.
pub fn scripted_graph(invoker: Arc<ScriptedInvoker>) -> AnalysisGraph {
    let nodes = GraphFactory::new(test_graph_config(), invoker.clone())
        .build_nodes()
        .expect("default nodes resolve");
    AnalysisGraph::new(nodes, invoker).expect("default pipeline is valid")
}

/// A graph factory that counts builds and can be made to fail.
pub struct CountingFactory {
    inner: GraphFactory,
    failure: Option<String>,
    delay: Duration,
    builds: AtomicUsize,
}

impl CountingFactory {
    pub fn new(invoker: Arc<ScriptedInvoker>) -> Self {
        Self {
            inner: GraphFactory::new(test_graph_config(), invoker),
            failure: None,
            delay: Duration::ZERO,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut factory = Self::new(Arc::new(ScriptedInvoker::new()));
        factory.failure = Some(message.to_string());
        factory
    }

    /// Slow construction down to widen the concurrent first-access window.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFactory<AnalysisGraph> for CountingFactory {
    async fn build(&self) -> Result<AnalysisGraph, AgentError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(AgentError::Config(message.clone())),
            None => self.inner.build().await,
        }
    }
}
