use crate::config::LlmSettings;
use agora_llm::{Message, TokenUsage, ToolCall};
use serde::{Deserialize, Serialize};

/// Input handed to the supervisor to start a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    pub thread_id: String,
    /// Replayed history, newest last; the final entry is the user message
    /// that triggered this run.
    pub messages: Vec<Message>,
}

impl RunInput {
    pub fn new(thread_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages,
        }
    }
}

/// Mutable state threaded through the nodes of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub thread_id: String,
    pub run_id: String,
    pub agent: String,
    pub messages: Vec<Message>,
    pub llm: LlmSettings,
    /// Accumulated usage across every model turn in this run
    pub usage: TokenUsage,
}

impl RunState {
    pub fn from_input(input: RunInput, agent: impl Into<String>, llm: LlmSettings) -> Self {
        Self {
            thread_id: input.thread_id,
            run_id: uuid::Uuid::new_v4().to_string(),
            agent: agent.into(),
            messages: input.messages,
            llm,
            usage: TokenUsage::default(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        matches!(
            self.last_message(),
            Some(Message::Assistant {
                tool_calls: Some(calls),
                ..
            }) if !calls.is_empty()
        )
    }

    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        match self.last_message() {
            Some(Message::Assistant {
                tool_calls: Some(calls),
                ..
            }) => calls.clone(),
            _ => Vec::new(),
        }
    }

    pub fn add_tool_result(&mut self, tool_call_id: String, result: String) {
        self.messages.push(Message::tool_result(tool_call_id, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::{FunctionCall, ToolCall};

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: "now".to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    fn state_with(messages: Vec<Message>) -> RunState {
        RunState::from_input(
            RunInput::new("thread-1", messages),
            "assistant",
            LlmSettings::new("gpt-4o"),
        )
    }

    #[test]
    fn pending_tool_calls_detected_on_last_assistant_message() {
        let state = state_with(vec![
            Message::user("what time is it"),
            Message::assistant_with_tools(None, vec![call("call_1")]),
        ]);

        assert!(state.has_pending_tool_calls());
        assert_eq!(state.pending_tool_calls().len(), 1);
    }

    #[test]
    fn no_pending_calls_after_tool_result() {
        let mut state = state_with(vec![Message::assistant_with_tools(
            None,
            vec![call("call_1")],
        )]);
        state.add_tool_result("call_1".to_string(), "12:00".to_string());

        assert!(!state.has_pending_tool_calls());
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn empty_tool_call_list_is_not_pending() {
        let state = state_with(vec![Message::Assistant {
            content: Some("done".to_string()),
            tool_calls: Some(vec![]),
        }]);
        assert!(!state.has_pending_tool_calls());
    }

    #[test]
    fn run_ids_are_unique() {
        let a = state_with(vec![]);
        let b = state_with(vec![]);
        assert_ne!(a.run_id, b.run_id);
    }
}
