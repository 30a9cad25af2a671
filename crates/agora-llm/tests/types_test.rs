use agora_llm::{ChatOptions, ChatRequest, Message, TokenUsage, Tool, ToolCall, ToolChoice};
use serde_json::json;

#[test]
fn message_serializes_with_role_tag() {
    let msg = Message::user("hello");
    let value = serde_json::to_value(&msg).unwrap();

    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "hello");
}

#[test]
fn assistant_message_skips_absent_fields() {
    let msg = Message::assistant("hi there");
    let value = serde_json::to_value(&msg).unwrap();

    assert_eq!(value["role"], "assistant");
    assert!(value.get("tool_calls").is_none());
}

#[test]
fn assistant_with_tools_roundtrips() {
    let call = ToolCall {
        id: "call_1".to_string(),
        tool_type: "function".to_string(),
        function: agora_llm::FunctionCall {
            name: "now".to_string(),
            arguments: "{}".to_string(),
        },
    };

    let msg = Message::assistant_with_tools(None, vec![call.clone()]);
    let json = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();

    match back {
        Message::Assistant { content, tool_calls } => {
            assert!(content.is_none());
            assert_eq!(tool_calls.unwrap(), vec![call]);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn tool_result_keeps_call_id() {
    let msg = Message::tool_result("call_7", "output");
    assert_eq!(msg.role(), "tool");
    assert_eq!(msg.text(), Some("output"));
}

#[test]
fn tool_choice_auto_serializes_as_string() {
    let choice = ToolChoice::auto();
    assert_eq!(serde_json::to_value(&choice).unwrap(), json!("auto"));
}

#[test]
fn tool_choice_force_serializes_as_object() {
    let choice = ToolChoice::force("lookup");
    let value = serde_json::to_value(&choice).unwrap();
    assert_eq!(value["type"], "function");
    assert_eq!(value["function"]["name"], "lookup");
}

#[test]
fn tool_definition_has_schema() {
    let tool = Tool::new("now", "Current UTC time", json!({"type": "object", "properties": {}}));
    assert_eq!(tool.function.name, "now");
    assert_eq!(tool.function.parameters["type"], "object");
}

#[test]
fn chat_request_builder() {
    let request = ChatRequest::new("gpt-4o", vec![Message::user("hi")])
        .with_options(ChatOptions::new().temperature(0.7).max_tokens(128));

    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.options.temperature, Some(0.7));
    assert_eq!(request.options.max_tokens, Some(128));
}

#[test]
fn usage_estimate_and_accumulate() {
    let mut usage = TokenUsage::estimate(400, 80);
    assert_eq!(usage.input_tokens, 100);
    assert_eq!(usage.output_tokens, 20);
    assert_eq!(usage.total_tokens, 120);

    usage.accumulate(&TokenUsage::new(10, 10));
    assert_eq!(usage.total_tokens, 140);
}
