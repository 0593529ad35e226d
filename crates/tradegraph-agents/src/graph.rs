use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};
use tradegraph_models::{
    serialize_state, AnalysisRequest, AnalysisState, EventKind, GraphConfig, MessageLike,
    StateValue, TurnRole,
};

use crate::bridge::{run_isolated, BridgeError};
use crate::claude_cli::check_cli_available;
use crate::error::AgentError;
use crate::invoker::{AgentInvoker, AgentSpec, ClaudeCliInvoker};
use crate::parser::extract_decision;
use crate::prompts::AgentRole;
use crate::resource::ResourceFactory;
use crate::sink::EventSink;

const DEBATE_STATE: &str = "investment_debate_state";
const MESSAGES: &str = "messages";

/// Result of one full pass through the graph.
#[derive(Debug, Clone)]
pub struct GraphOutcome {
    pub company: String,
    /// BUY, SELL or HOLD.
    pub decision: String,
    pub state: AnalysisState,
}

/// Ordered multi-agent pipeline. Built once and shared by every request;
/// all per-run data lives in the [`AnalysisState`] owned by `propagate`.
pub struct AnalysisGraph {
    nodes: Vec<AgentSpec>,
    invoker: Arc<dyn AgentInvoker>,
}

impl AnalysisGraph {
    pub fn new(nodes: Vec<AgentSpec>, invoker: Arc<dyn AgentInvoker>) -> Result<Self, AgentError> {
        if nodes.is_empty() {
            return Err(AgentError::Config("graph has no enabled nodes".to_string()));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(AgentError::Config(format!(
                    "duplicate node name: {}",
                    node.name
                )));
            }
        }

        Ok(Self { nodes, invoker })
    }

    pub fn nodes(&self) -> &[AgentSpec] {
        &self.nodes
    }

    /// Run every node in order against `request`.
    ///
    /// Progress is reported through `sink` when one is given. Any node
    /// failure aborts the run.
    pub async fn propagate(
        &self,
        request: &AnalysisRequest,
        sink: Option<&EventSink>,
    ) -> Result<GraphOutcome, AgentError> {
        let started = Instant::now();
        let mut state = initial_state(request);

        emit(
            sink,
            EventKind::Status,
            json!({
                "message": format!("Starting analysis of {}", request.company),
                "company": request.company,
                "trade_date": request.trade_date.to_string(),
                "agents": self.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            }),
        )
        .await?;

        let mut last_output = String::new();
        for spec in &self.nodes {
            emit(
                sink,
                EventKind::AgentStart,
                json!({"agent": spec.name, "role": spec.role.as_str()}),
            )
            .await?;

            let node_started = Instant::now();
            let input = agent_input(request, &state)?;
            let output = self.invoker.invoke(spec, &input).await.map_err(|e| {
                warn!(company = %request.company, agent = %spec.name, error = %e, "Agent failed");
                e
            })?;
            debug!(
                agent = %spec.name,
                elapsed_ms = node_started.elapsed().as_millis() as u64,
                output_len = output.len(),
                "Agent completed"
            );

            let delta = record_output(&mut state, spec, &output);
            last_output = output;

            emit(
                sink,
                EventKind::AgentComplete,
                json!({
                    "agent": spec.name,
                    "role": spec.role.as_str(),
                    "delta": serialize_state(&delta),
                }),
            )
            .await?;
        }

        let decision_text = state
            .get("final_trade_decision")
            .and_then(StateValue::as_str)
            .unwrap_or(&last_output);
        let decision = extract_decision(decision_text).as_str().to_string();

        info!(
            company = %request.company,
            trade_date = %request.trade_date,
            decision = %decision,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        emit(
            sink,
            EventKind::Final,
            json!({
                "company": request.company,
                "decision": decision,
                "state": serialize_state(&state),
            }),
        )
        .await?;

        Ok(GraphOutcome {
            company: request.company.clone(),
            decision,
            state,
        })
    }
}

async fn emit(
    sink: Option<&EventSink>,
    kind: EventKind,
    payload: serde_json::Value,
) -> Result<(), AgentError> {
    match sink {
        Some(sink) => sink.emit(kind, payload).await,
        None => Ok(()),
    }
}

fn initial_state(request: &AnalysisRequest) -> AnalysisState {
    let messages: Vec<StateValue> = request
        .conversation
        .iter()
        .map(|turn| {
            let message = match turn.role {
                TurnRole::User => MessageLike::human(turn.text.clone()),
                TurnRole::Assistant => MessageLike::ai(turn.text.clone()),
            };
            StateValue::Message(message)
        })
        .chain(std::iter::once(StateValue::Message(MessageLike::human(
            format!(
                "Analyze {} for trading on {}",
                request.company, request.trade_date
            ),
        ))))
        .collect();

    let mut state = AnalysisState::new();
    state.insert("company_of_interest".into(), request.company.as_str().into());
    state.insert("trade_date".into(), request.trade_date.to_string().into());
    state.insert(MESSAGES.into(), StateValue::Sequence(messages));
    for report in [
        "market_report",
        "sentiment_report",
        "news_report",
        "fundamentals_report",
        "investment_plan",
        "trader_investment_plan",
        "final_trade_decision",
    ] {
        state.insert(report.into(), StateValue::Null);
    }
    state.insert(
        DEBATE_STATE.into(),
        StateValue::mapping([
            ("bull_history", StateValue::Sequence(Vec::new())),
            ("bear_history", StateValue::Sequence(Vec::new())),
            ("count", StateValue::Int(0)),
            ("judge_decision", StateValue::Null),
        ]),
    );
    state
}

/// The JSON document each agent receives as its user prompt.
fn agent_input(request: &AnalysisRequest, state: &AnalysisState) -> Result<String, AgentError> {
    let conversation: Vec<_> = request
        .conversation
        .iter()
        .map(|turn| json!({"role": turn.role, "content": turn.text}))
        .collect();

    let mut view = state.clone();
    view.remove(MESSAGES);

    Ok(serde_json::to_string(&json!({
        "company": request.company,
        "trade_date": request.trade_date.to_string(),
        "conversation": conversation,
        "state": serialize_state(&view),
    }))?)
}

/// Store a node's output into `state` and return the fields that changed.
fn record_output(state: &mut AnalysisState, spec: &AgentSpec, output: &str) -> AnalysisState {
    let mut delta = AnalysisState::new();
    let text = StateValue::from(output);

    match spec.role {
        AgentRole::MarketAnalyst => {
            delta.insert("market_report".into(), text);
        }
        AgentRole::SocialAnalyst => {
            delta.insert("sentiment_report".into(), text);
        }
        AgentRole::NewsAnalyst => {
            delta.insert("news_report".into(), text);
        }
        AgentRole::FundamentalsAnalyst => {
            delta.insert("fundamentals_report".into(), text);
        }
        AgentRole::BullResearcher | AgentRole::BearResearcher => {
            let history = if spec.role == AgentRole::BullResearcher {
                "bull_history"
            } else {
                "bear_history"
            };
            let mut debate = debate_fields(state);
            let argument = StateValue::from(format!("{}: {output}", spec.name));
            match debate.get_mut(history) {
                Some(StateValue::Sequence(items)) => items.push(argument.clone()),
                _ => {
                    debate.insert(history.into(), StateValue::Sequence(vec![argument.clone()]));
                }
            }
            let count = match debate.get("count") {
                Some(StateValue::Int(n)) => *n,
                _ => 0,
            };
            debate.insert("count".into(), StateValue::Int(count + 1));
            debate.insert("current_response".into(), argument);
            delta.insert(DEBATE_STATE.into(), StateValue::Mapping(debate));
        }
        AgentRole::ResearchManager => {
            let mut debate = debate_fields(state);
            debate.insert("judge_decision".into(), text.clone());
            delta.insert(DEBATE_STATE.into(), StateValue::Mapping(debate));
            delta.insert("investment_plan".into(), text);
        }
        AgentRole::Trader => {
            delta.insert("trader_investment_plan".into(), text);
        }
        AgentRole::RiskManager => {
            delta.insert("final_trade_decision".into(), text);
        }
    }

    for (key, value) in &delta {
        state.insert(key.clone(), value.clone());
    }

    let message = StateValue::Message(MessageLike::ai(output).with_name(spec.name.clone()));
    match state.get_mut(MESSAGES) {
        Some(StateValue::Sequence(items)) => items.push(message.clone()),
        _ => {
            state.insert(MESSAGES.into(), StateValue::Sequence(vec![message.clone()]));
        }
    }
    delta.insert(MESSAGES.into(), StateValue::Sequence(vec![message]));

    delta
}

fn debate_fields(state: &AnalysisState) -> std::collections::BTreeMap<String, StateValue> {
    match state.get(DEBATE_STATE) {
        Some(StateValue::Mapping(fields)) => fields.clone(),
        _ => Default::default(),
    }
}

/// Run one analysis inside an isolated execution context.
pub async fn run_analysis(
    graph: Arc<AnalysisGraph>,
    request: AnalysisRequest,
    sink: Option<EventSink>,
    timeout: Duration,
) -> Result<GraphOutcome, BridgeError<AgentError>> {
    run_isolated(
        move |(request, sink): (AnalysisRequest, Option<EventSink>)| async move {
            graph.propagate(&request, sink.as_ref()).await
        },
        (request, sink),
        timeout,
    )
    .await
}

/// Builds an [`AnalysisGraph`] from configuration.
pub struct GraphFactory {
    config: GraphConfig,
    invoker: Arc<dyn AgentInvoker>,
}

impl GraphFactory {
    pub fn new(config: GraphConfig, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { config, invoker }
    }

    /// Factory whose agents run through the local `claude` CLI.
    pub fn with_claude_cli(config: GraphConfig) -> Self {
        let invoker = ClaudeCliInvoker::new(Duration::from_secs(config.agent_timeout_seconds))
            .with_program(&config.cli_path);
        Self::new(config, Arc::new(invoker))
    }

    /// Resolve enabled nodes into agent specs, in pipeline order.
    pub fn build_nodes(&self) -> Result<Vec<AgentSpec>, AgentError> {
        self.config
            .nodes
            .iter()
            .filter(|node| node.enabled)
            .map(|node| {
                let role = AgentRole::parse(&node.role).ok_or_else(|| {
                    AgentError::Config(format!(
                        "unknown role '{}' for node '{}'",
                        node.role, node.name
                    ))
                })?;
                let model = match &node.model {
                    Some(model) => model.clone(),
                    None if role.is_judge() => self.config.deep_think_model.clone(),
                    None => self.config.quick_think_model.clone(),
                };
                Ok(AgentSpec::new(node.name.clone(), role, model))
            })
            .collect()
    }
}

#[async_trait]
impl ResourceFactory<AnalysisGraph> for GraphFactory {
    async fn build(&self) -> Result<AnalysisGraph, AgentError> {
        if self.config.require_cli && !check_cli_available(&self.config.cli_path).await {
            return Err(AgentError::Upstream(format!(
                "agent CLI '{}' is not runnable",
                self.config.cli_path
            )));
        }

        let nodes = self.build_nodes()?;
        info!(node_count = nodes.len(), "Analysis graph nodes resolved");
        AnalysisGraph::new(nodes, Arc::clone(&self.invoker))
    }
}
