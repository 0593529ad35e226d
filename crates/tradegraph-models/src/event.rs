use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Status,
    AgentStart,
    AgentComplete,
    Error,
    /// Terminates a successful stream. Exactly one per completed run.
    Final,
}

/// One progress event of an analysis run.
///
/// `payload` is already canonical JSON: producers run state values through
/// [`crate::wire::serialize_state`] before building the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    pub kind: EventKind,
    /// Strictly increasing within one request's stream, starting at 1.
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl StreamEvent {
    pub fn is_final(&self) -> bool {
        self.kind == EventKind::Final
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serialization() {
        assert_eq!(
            serde_json::to_string(&EventKind::AgentStart).unwrap(),
            "\"agent_start\""
        );
        assert_eq!(
            serde_json::to_string(&EventKind::AgentComplete).unwrap(),
            "\"agent_complete\""
        );
        assert_eq!(serde_json::to_string(&EventKind::Final).unwrap(), "\"final\"");
    }

    #[test]
    fn only_final_is_final() {
        let mut event = StreamEvent {
            kind: EventKind::Status,
            sequence_number: 1,
            timestamp: Utc::now(),
            payload: serde_json::json!({"message": "starting"}),
        };
        assert!(!event.is_final());
        event.kind = EventKind::Final;
        assert!(event.is_final());
    }
}
