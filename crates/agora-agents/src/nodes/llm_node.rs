use crate::node::{EventSender, Node, NodeType};
use agora_llm::{
    ChatOptions, ChatRequest, FunctionCall, Message, ModelRouter, TokenEvent, TokenUsage, Tool,
    ToolCall, ToolChoice,
};
use agora_types::{RunEvent, RunState};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs one model turn: streams the completion, forwards deltas as run
/// events, and appends the assembled assistant message to state.
pub struct LlmNode {
    models: Arc<ModelRouter>,
    /// Tool definitions advertised to the model for this run
    tools: Vec<Tool>,
}

/// Assembled output of one model turn.
struct TurnOutput {
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl LlmNode {
    pub fn new(models: Arc<ModelRouter>, tools: Vec<Tool>) -> Self {
        Self { models, tools }
    }

    fn build_request(&self, state: &RunState) -> ChatRequest {
        let mut options = ChatOptions::new();

        if !self.tools.is_empty() {
            options = options.tools(self.tools.clone()).tool_choice(ToolChoice::auto());
        }
        if let Some(temp) = state.llm.temperature {
            options = options.temperature(temp);
        }
        if let Some(max_tokens) = state.llm.max_tokens {
            options = options.max_tokens(max_tokens);
        }

        ChatRequest::new(state.llm.model.clone(), state.messages.clone()).with_options(options)
    }

    /// Forward token events downstream while assembling the full message.
    ///
    /// Tool-call deltas carry id/name on their first chunk and argument
    /// fragments afterwards, keyed by index.
    async fn process_stream(
        &self,
        mut stream: agora_llm::TokenStream,
        event_tx: &EventSender,
    ) -> Result<TurnOutput> {
        let mut content = String::new();
        let mut call_buffers: BTreeMap<u32, (Option<String>, Option<String>, String)> =
            BTreeMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                TokenEvent::Message { content: delta } => {
                    content.push_str(&delta);
                    event_tx
                        .send(RunEvent::Message { content: delta })
                        .await?;
                }
                TokenEvent::ToolCall {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let entry = call_buffers
                        .entry(index)
                        .or_insert((None, None, String::new()));
                    if id.is_some() {
                        entry.0 = id.clone();
                    }
                    if name.is_some() {
                        entry.1 = name.clone();
                    }
                    if let Some(args) = &arguments {
                        entry.2.push_str(args);
                    }

                    event_tx
                        .send(RunEvent::ToolCall {
                            index,
                            id,
                            name,
                            arguments,
                        })
                        .await?;
                }
                TokenEvent::Done { finish_reason } => {
                    event_tx.send(RunEvent::Done { finish_reason }).await?;
                }
            }
        }

        let tool_calls = call_buffers
            .into_values()
            .filter_map(|(id, name, arguments)| match (id, name) {
                (Some(id), Some(name)) => Some(ToolCall {
                    id,
                    tool_type: "function".to_string(),
                    function: FunctionCall { name, arguments },
                }),
                _ => None,
            })
            .collect();

        Ok(TurnOutput {
            content,
            tool_calls,
        })
    }
}

#[async_trait]
impl Node for LlmNode {
    async fn execute(&self, state: &mut RunState, event_tx: EventSender) -> Result<()> {
        let request = self.build_request(state);
        let input_chars: usize = request
            .messages
            .iter()
            .filter_map(|m| m.text())
            .map(str::len)
            .sum();

        let client = self.models.resolve(&request.model);
        let stream = client.chat_stream(request).await?;
        let output = self.process_stream(stream, &event_tx).await?;

        let output_chars = output.content.len()
            + output
                .tool_calls
                .iter()
                .map(|c| c.function.arguments.len())
                .sum::<usize>();
        state
            .usage
            .accumulate(&TokenUsage::estimate(input_chars, output_chars));

        let content = (!output.content.is_empty()).then(|| output.content.clone());
        if output.tool_calls.is_empty() {
            if let Some(content) = content {
                state.add_message(Message::assistant(content));
            }
        } else {
            state.add_message(Message::assistant_with_tools(content, output.tool_calls));
        }

        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::Llm
    }
}
