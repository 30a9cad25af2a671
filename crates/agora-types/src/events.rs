use agora_llm::TokenUsage;
use serde::{Deserialize, Serialize};

/// Event emitted while a run executes.
///
/// One stream per run, delivered to SSE subscribers and to every WebSocket
/// connection belonging to the thread owner. Every run emits exactly one
/// `RunStarted` and exactly one terminal event (`RunFinished` or `Error`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run accepted and scheduled
    RunStarted {
        run_id: String,
        thread_id: String,
        timestamp: i64,
    },

    /// The supervisor picked an agent for this run
    AgentSelected { agent: String, reason: String },

    /// Response text delta from the active agent
    Message { content: String },

    /// Incremental tool-call delta
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    /// Tool execution completed
    ToolResult {
        tool_call_id: String,
        result: String,
        is_error: bool,
        duration_ms: u64,
    },

    /// Model turn completed
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },

    /// Token usage and the settled cost for the whole run
    Usage {
        #[serde(flatten)]
        usage: TokenUsage,
        cost_microcredits: u64,
    },

    /// Fatal error; terminal
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },

    /// Run completed; terminal
    RunFinished {
        status: String,
        total_duration_ms: u64,
    },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_snake_case_type() {
        let event = RunEvent::AgentSelected {
            agent: "researcher".to_string(),
            reason: "keyword match".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "agent_selected");
        assert_eq!(value["agent"], "researcher");
    }

    #[test]
    fn terminal_events() {
        assert!(RunEvent::RunFinished {
            status: "success".to_string(),
            total_duration_ms: 10,
        }
        .is_terminal());
        assert!(RunEvent::Error {
            message: "boom".to_string(),
            agent: None,
        }
        .is_terminal());
        assert!(!RunEvent::Done { finish_reason: None }.is_terminal());
    }

    #[test]
    fn usage_event_carries_flat_token_counts() {
        let event = RunEvent::Usage {
            usage: TokenUsage::new(10, 20),
            cost_microcredits: 99,
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "usage");
        assert_eq!(value["input_tokens"], 10);
        assert_eq!(value["output_tokens"], 20);
        assert_eq!(value["cost_microcredits"], 99);
        assert!(value.get("usage").is_none());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let event = RunEvent::ToolCall {
            index: 0,
            id: None,
            name: None,
            arguments: Some("{}".to_string()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["arguments"], "{}");
    }
}
