use crate::node::NodeType;
use agora_types::RunState;

/// Decides which node runs next based on the current state.
pub trait Router: Send + Sync {
    fn next(&self, state: &RunState, current: NodeType) -> NextNode;
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextNode {
    Llm,
    Tool,
    End,
}

/// ReAct-style routing: LLM -> Tool while the model keeps requesting
/// tool calls, otherwise the run ends.
pub struct SupervisorRouter;

impl Router for SupervisorRouter {
    fn next(&self, state: &RunState, current: NodeType) -> NextNode {
        match current {
            NodeType::Llm => {
                if state.has_pending_tool_calls() {
                    NextNode::Tool
                } else {
                    NextNode::End
                }
            }
            NodeType::Tool => NextNode::Llm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::{FunctionCall, Message, ToolCall};
    use agora_types::{LlmSettings, RunInput};

    fn state_with(messages: Vec<Message>) -> RunState {
        RunState::from_input(
            RunInput::new("t1", messages),
            "assistant",
            LlmSettings::new("gpt-4o-mini"),
        )
    }

    #[test]
    fn llm_without_tool_calls_ends_the_run() {
        let state = state_with(vec![Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(SupervisorRouter.next(&state, NodeType::Llm), NextNode::End);
    }

    #[test]
    fn llm_with_tool_calls_routes_to_tool() {
        let call = ToolCall {
            id: "call_1".to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: "now".to_string(),
                arguments: "{}".to_string(),
            },
        };
        let state = state_with(vec![
            Message::user("what time is it?"),
            Message::assistant_with_tools(None, vec![call]),
        ]);
        assert_eq!(SupervisorRouter.next(&state, NodeType::Llm), NextNode::Tool);
    }

    #[test]
    fn tool_always_returns_to_llm() {
        let state = state_with(vec![Message::user("hi")]);
        assert_eq!(SupervisorRouter.next(&state, NodeType::Tool), NextNode::Llm);
    }
}
