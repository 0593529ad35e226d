//! Request and response bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tradegraph_agents::GraphOutcome;
use tradegraph_models::{serialize_state, AnalysisRequest, ConversationTurn};
use uuid::Uuid;

use crate::error::AppError;

/// `POST /analyze` and `POST /analyze/stream` body.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeBody {
    pub company_name: String,
    /// `YYYY-MM-DD`.
    pub trade_date: String,
    #[serde(default)]
    pub conversation_context: Option<Vec<ConversationTurn>>,
}

impl AnalyzeBody {
    pub fn into_request(self) -> Result<AnalysisRequest, AppError> {
        let request = validate(&self.company_name, &self.trade_date)?;
        Ok(request.with_conversation(self.conversation_context.unwrap_or_default()))
    }
}

/// Check the subject and date shared by every analysis body.
pub fn validate(company_name: &str, trade_date: &str) -> Result<AnalysisRequest, AppError> {
    let company = company_name.trim();
    if company.is_empty() {
        return Err(AppError::Validation("company_name must not be empty".into()));
    }
    let date = NaiveDate::parse_from_str(trade_date.trim(), "%Y-%m-%d").map_err(|e| {
        AppError::Validation(format!("trade_date must be YYYY-MM-DD: {e}"))
    })?;
    Ok(AnalysisRequest::new(company, date))
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub company: String,
    pub decision: String,
    pub state: serde_json::Value,
}

impl From<GraphOutcome> for AnalyzeResponse {
    fn from(outcome: GraphOutcome) -> Self {
        Self {
            state: serialize_state(&outcome.state),
            company: outcome.company,
            decision: outcome.decision,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `error`.
    pub status: &'static str,
    pub service: String,
    pub graph_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateThreadBody {
    #[serde(default)]
    pub title: String,
}

/// `POST /threads/{id}/analyze` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadAnalyzeBody {
    pub company_name: String,
    pub trade_date: String,
    /// Saved as the user's message. Defaults to a generated prompt.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadAnalyzeResponse {
    pub thread_id: Uuid,
    pub company: String,
    pub decision: String,
    pub state: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub graph_initialized: bool,
}
