//! Tests that drive the real Claude CLI.
//!
//! These tests are `#[ignore]` by default. They need the `claude` CLI on
//! PATH and valid Anthropic credentials.
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p tradegraph-agents --test cli_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use tradegraph_agents::claude_cli::{check_cli_available, invoke_claude, CliCall, DEFAULT_PROGRAM};
use tradegraph_agents::parser::{extract_decision, extract_json};
use tradegraph_agents::{AgentInvoker, AgentRole, AgentSpec, ClaudeCliInvoker, GraphFactory};
use tradegraph_agents::{GraphStatus, ResourceManager};
use tradegraph_models::GraphConfig;

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(
        check_cli_available(DEFAULT_PROGRAM).await,
        "claude CLI not found on PATH; install it from https://docs.anthropic.com/en/docs/claude-code"
    );
}

/// The parser must cope with whatever wrapping the CLI puts around JSON.
#[tokio::test]
#[ignore]
async fn cli_output_is_parseable_json() {
    if !check_cli_available(DEFAULT_PROGRAM).await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let call = CliCall::new("claude-3-5-haiku-latest", Duration::from_secs(30));

    let system_prompt = concat!(
        "You are a test agent. Respond ONLY with a JSON object, no other text.\n",
        "The JSON must have exactly these fields:\n",
        "- \"status\": the string \"ok\"\n",
        "- \"echo\": repeat back the user's message exactly\n",
    );

    let raw = invoke_claude(&call, system_prompt, "ping")
        .await
        .expect("Claude CLI invocation failed");

    let json_str = extract_json(&raw).unwrap_or_else(|e| {
        panic!("Failed to extract JSON from CLI output ({e}).\nRaw output:\n---\n{raw}\n---")
    });
    let parsed: serde_json::Value =
        serde_json::from_str(&json_str).expect("Extracted JSON is not valid");

    assert_eq!(parsed["status"], "ok", "Unexpected response structure: {parsed}");
}

#[tokio::test]
#[ignore]
async fn cli_reports_errors_for_invalid_model() {
    if !check_cli_available(DEFAULT_PROGRAM).await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let call = CliCall::new("nonexistent-model-12345", Duration::from_secs(15));

    let err = invoke_claude(&call, "You are a test.", "hello")
        .await
        .expect_err("invalid model must fail");
    assert!(err.is_upstream());
}

/// The risk manager prompt should yield an extractable decision.
#[tokio::test]
#[ignore]
async fn risk_manager_answers_with_a_decision() {
    if !check_cli_available(DEFAULT_PROGRAM).await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let invoker = ClaudeCliInvoker::new(Duration::from_secs(60));
    let spec = AgentSpec::new("risk", AgentRole::RiskManager, "claude-3-5-haiku-latest");
    let input = serde_json::json!({
        "company": "AAPL",
        "trade_date": "2024-12-19",
        "conversation": [],
        "state": {"trader_investment_plan": "Accumulate on dips. FINAL TRANSACTION PROPOSAL: **BUY**"},
    });

    let raw = invoker
        .invoke(&spec, &input.to_string())
        .await
        .expect("Claude CLI invocation failed");

    let decision = extract_decision(&raw);
    assert!(
        ["BUY", "SELL", "HOLD"].contains(&decision.as_str()),
        "raw output: {raw}"
    );
}

#[tokio::test]
#[ignore]
async fn real_graph_constructs() {
    if !check_cli_available(DEFAULT_PROGRAM).await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let manager = ResourceManager::new(Arc::new(GraphFactory::with_claude_cli(
        GraphConfig::default(),
    )));
    let graph = manager.get_resource().await.expect("graph builds");
    assert_eq!(graph.nodes().len(), 9);
    assert_eq!(manager.status(), GraphStatus::Ready);
}
