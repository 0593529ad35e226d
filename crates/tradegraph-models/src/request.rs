use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A prior conversational turn supplied alongside an analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub id: String,
    pub role: TurnRole,
    /// Wire name is `content`, matching the chat message records.
    #[serde(rename = "content")]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An analysis request submitted to the shared graph.
///
/// Built once per inbound call and never mutated afterwards; the graph only
/// borrows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    /// Ticker or company name the analysis is about.
    pub company: String,
    /// As-of date for the analysis.
    pub trade_date: NaiveDate,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

impl AnalysisRequest {
    pub fn new(company: impl Into<String>, trade_date: NaiveDate) -> Self {
        Self {
            company: company.into(),
            trade_date,
            conversation: Vec::new(),
        }
    }

    pub fn with_conversation(mut self, conversation: Vec<ConversationTurn>) -> Self {
        self.conversation = conversation;
        self
    }
}
