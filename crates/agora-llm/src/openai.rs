// OpenAI-compatible client (HTTP direct, no SDK)

use crate::streaming::parse_chat_sse_stream;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenStream, TokenUsage};
use crate::types::{Message, ToolCall};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client against api.openai.com with bearer auth.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_API_BASE)
    }

    /// Create a client against any OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_chat_payload(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Value> {
        let wire_messages: Vec<Value> = messages
            .into_iter()
            .map(convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = serde_json::json!({
            "model": model,
            "messages": wire_messages,
            "stream": stream,
        });

        let obj = request
            .as_object_mut()
            .context("chat payload is always an object")?;

        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }
        if let Some(tools) = &options.tools {
            if !tools.is_empty() {
                obj.insert("tools".to_string(), serde_json::to_value(tools)?);
            }
        }
        if let Some(tool_choice) = &options.tool_choice {
            obj.insert("tool_choice".to_string(), serde_json::to_value(tool_choice)?);
        }

        Ok(request)
    }
}

/// Convert our Message type to the OpenAI wire format.
fn convert_message(message: Message) -> Result<Value> {
    match message {
        Message::System { content } => Ok(serde_json::json!({
            "role": "system",
            "content": content,
        })),
        Message::User { content } => Ok(serde_json::json!({
            "role": "user",
            "content": content,
        })),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut obj = serde_json::json!({ "role": "assistant" });
            let map = obj.as_object_mut().context("assistant payload is an object")?;

            if let Some(content) = content {
                map.insert("content".to_string(), serde_json::json!(content));
            }
            if let Some(tool_calls) = tool_calls {
                map.insert("tool_calls".to_string(), serde_json::to_value(tool_calls)?);
            }

            Ok(obj)
        }
        Message::Tool {
            tool_call_id,
            content,
        } => Ok(serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        })),
    }
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload =
            self.build_chat_payload(&request.model, request.messages, &request.options, false)?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM provider error ({}): {}", status, error_text);
        }

        let raw: WireChatResponse = response.json().await.context("Failed to parse response")?;

        let choice = raw.choices.into_iter().next();
        Ok(ChatResponse {
            content: choice.as_ref().and_then(|c| c.message.content.clone()),
            tool_calls: choice.as_ref().and_then(|c| c.message.tool_calls.clone()),
            usage: raw.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<TokenStream> {
        let payload =
            self.build_chat_payload(&request.model, request.messages, &request.options, true)?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM provider error ({}): {}", status, error_text);
        }

        Ok(parse_chat_sse_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolChoice;

    #[test]
    fn payload_carries_options() {
        let client = OpenAiClient::new("test-key").unwrap();
        let options = ChatOptions::new().temperature(0.3).max_tokens(64);
        let payload = client
            .build_chat_payload("gpt-4o", vec![Message::user("hi")], &options, true)
            .unwrap();

        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["temperature"], 0.3);
        assert_eq!(payload["max_tokens"], 64);
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[test]
    fn payload_omits_empty_tools() {
        let client = OpenAiClient::new("test-key").unwrap();
        let options = ChatOptions::new()
            .tools(vec![])
            .tool_choice(ToolChoice::auto());
        let payload = client
            .build_chat_payload("gpt-4o", vec![Message::user("hi")], &options, false)
            .unwrap();

        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn tool_message_converts_with_call_id() {
        let value = convert_message(Message::tool_result("call_9", "42")).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_9");
        assert_eq!(value["content"], "42");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::with_base_url("k", "http://localhost:8080/v1/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
