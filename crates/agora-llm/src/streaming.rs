use anyhow::Result;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;

/// Incremental event from a streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    /// Response text delta
    Message { content: String },

    /// Incremental tool-call delta; id/name arrive on the first chunk,
    /// arguments accumulate across chunks under the same index
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl ChatStreamChunk {
    fn to_token_events(&self) -> Vec<TokenEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(TokenEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    events.push(TokenEvent::ToolCall {
                        index: tc.index,
                        id: tc.id.clone(),
                        name: tc.function.as_ref().and_then(|f| f.name.clone()),
                        arguments: tc.function.as_ref().and_then(|f| f.arguments.clone()),
                    });
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(TokenEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        events
    }
}

/// Parse an OpenAI-style SSE body into token events.
///
/// Buffers bytes until a full line is available, so chunks split mid-line
/// or mid-UTF-8 are handled.
pub fn parse_chat_sse_stream(
    response: Response,
) -> Pin<Box<dyn Stream<Item = Result<TokenEvent>> + Send>> {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = VecDeque::with_capacity(8192);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        if let Ok(line_str) = std::str::from_utf8(&line_bytes) {
                            let line = line_str.trim();

                            if line.is_empty() {
                                continue;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if data == "[DONE]" {
                                    yield Ok(TokenEvent::Done { finish_reason: None });
                                    break;
                                }

                                match serde_json::from_str::<ChatStreamChunk>(data) {
                                    Ok(chunk) => {
                                        for event in chunk.to_token_events() {
                                            yield Ok(event);
                                        }
                                    }
                                    Err(e) => yield Err(anyhow::anyhow!("Failed to parse stream chunk: {}", e)),
                                }
                            }
                        }
                    }
                }
                Err(e) => yield Err(anyhow::anyhow!("Stream error: {}", e)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_with_content_yields_message_event() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"hi","tool_calls":null},"finish_reason":null}]}"#,
        )
        .unwrap();

        let events = chunk.to_token_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TokenEvent::Message { content } if content == "hi"));
    }

    #[test]
    fn chunk_with_finish_reason_yields_done() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":null,"tool_calls":null},"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        let events = chunk.to_token_events();
        assert!(matches!(
            &events[0],
            TokenEvent::Done { finish_reason: Some(r) } if r == "stop"
        ));
    }

    #[test]
    fn tool_call_delta_carries_index_and_fragments() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":null,"tool_calls":[{"index":0,"id":"call_1","function":{"name":"now","arguments":"{\""}}]},"finish_reason":null}]}"#,
        )
        .unwrap();

        let events = chunk.to_token_events();
        match &events[0] {
            TokenEvent::ToolCall { index, id, name, arguments } => {
                assert_eq!(*index, 0);
                assert_eq!(id.as_deref(), Some("call_1"));
                assert_eq!(name.as_deref(), Some("now"));
                assert_eq!(arguments.as_deref(), Some("{\""));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
