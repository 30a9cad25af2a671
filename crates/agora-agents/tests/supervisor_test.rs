use agora_agents::{
    AgentProfile, AgentRegistry, RunEvent, RunInput, Supervisor, SupervisorConfig, ToolExecutor,
    ToolRegistry,
};
use agora_llm::{
    ChatClient, ChatRequest, ChatResponse, CostTable, Message, ModelRate, ModelRouter,
    TokenEvent, TokenStream,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Chat client that plays back one scripted token stream per call.
struct ScriptedClient {
    turns: Mutex<VecDeque<Vec<TokenEvent>>>,
}

impl ScriptedClient {
    fn new(turns: Vec<Vec<TokenEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        anyhow::bail!("scripted client only streams")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<TokenStream> {
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
        Ok(Box::pin(stream::iter(turn.into_iter().map(Ok))))
    }
}

struct EchoTool;

#[async_trait]
impl ToolExecutor for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "echoes its input back"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        Ok(arguments["text"].as_str().unwrap_or("").to_string())
    }
}

fn message(content: &str) -> TokenEvent {
    TokenEvent::Message {
        content: content.to_string(),
    }
}

fn done() -> TokenEvent {
    TokenEvent::Done {
        finish_reason: Some("stop".to_string()),
    }
}

fn tool_call_turn() -> Vec<TokenEvent> {
    vec![
        TokenEvent::ToolCall {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("echo".to_string()),
            arguments: Some(r#"{"text":"hi"}"#.to_string()),
        },
        TokenEvent::Done {
            finish_reason: Some("tool_calls".to_string()),
        },
    ]
}

fn default_agent(tools: &[&str]) -> AgentProfile {
    AgentProfile {
        name: "general".to_string(),
        description: "general assistant".to_string(),
        system_prompt: "You are a helpful assistant".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: None,
        max_tokens: None,
        tools: tools.iter().map(|t| t.to_string()).collect(),
        keywords: Vec::new(),
    }
}

fn supervisor(turns: Vec<Vec<TokenEvent>>, config: SupervisorConfig) -> Supervisor {
    let client = Arc::new(ScriptedClient::new(turns));
    let costs = CostTable::new().with_default_rate(ModelRate::new(1000, 2000));
    let models = ModelRouter::new(client, "gpt-4o-mini").with_costs(costs);

    let registry = AgentRegistry::new(default_agent(&["echo"]));
    let tools = ToolRegistry::new().with_tool(Arc::new(EchoTool));

    Supervisor::new(
        Arc::new(registry),
        Arc::new(models),
        Arc::new(tools),
        config,
    )
}

async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn input(text: &str) -> RunInput {
    RunInput::new("thread-1", vec![Message::user(text)])
}

#[tokio::test]
async fn plain_run_emits_the_full_event_sequence() {
    let sup = supervisor(
        vec![vec![message("Hello"), message(" there"), done()]],
        SupervisorConfig::default(),
    );

    let events = collect(sup.spawn_run(input("hi"), None)).await;

    assert!(matches!(events[0], RunEvent::RunStarted { .. }));
    assert!(matches!(events[1], RunEvent::AgentSelected { .. }));

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Message { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello there");

    assert!(matches!(events.last(), Some(RunEvent::RunFinished { .. })));
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn run_started_carries_the_thread_id() {
    let sup = supervisor(vec![vec![message("ok"), done()]], SupervisorConfig::default());

    let events = collect(sup.spawn_run(input("hi"), None)).await;

    match &events[0] {
        RunEvent::RunStarted { thread_id, run_id, .. } => {
            assert_eq!(thread_id, "thread-1");
            assert!(!run_id.is_empty());
        }
        other => panic!("expected run_started, got {:?}", other),
    }
}

#[tokio::test]
async fn tool_round_trip_feeds_the_result_back() {
    let sup = supervisor(
        vec![tool_call_turn(), vec![message("You said hi"), done()]],
        SupervisorConfig::default(),
    );

    let events = collect(sup.spawn_run(input("please echo hi"), None)).await;

    let result = events.iter().find_map(|e| match e {
        RunEvent::ToolResult {
            tool_call_id,
            result,
            is_error,
            ..
        } => Some((tool_call_id.clone(), result.clone(), *is_error)),
        _ => None,
    });

    let (id, result, is_error) = result.expect("no tool_result event");
    assert_eq!(id, "call_1");
    assert_eq!(result, "hi");
    assert!(!is_error);

    assert!(matches!(events.last(), Some(RunEvent::RunFinished { .. })));
}

#[tokio::test]
async fn runaway_tool_loop_hits_the_iteration_guard() {
    // Every turn requests another tool call; the guard must cut it off.
    let turns = (0..8).map(|_| tool_call_turn()).collect();
    let config = SupervisorConfig::new().with_max_iterations(4);

    let events = collect(supervisor(turns, config).spawn_run(input("loop"), None)).await;

    match events.last() {
        Some(RunEvent::Error { message, .. }) => {
            assert!(message.contains("max iterations"), "got: {}", message)
        }
        other => panic!("expected error terminal, got {:?}", other),
    }
    assert!(!events
        .iter()
        .any(|e| matches!(e, RunEvent::RunFinished { .. })));
}

#[tokio::test]
async fn usage_event_reports_a_nonzero_cost() {
    let long_reply = "word ".repeat(100);
    let sup = supervisor(
        vec![vec![message(&long_reply), done()]],
        SupervisorConfig::default(),
    );

    let events = collect(sup.spawn_run(input("talk a lot"), None)).await;

    let usage = events.iter().find_map(|e| match e {
        RunEvent::Usage {
            usage,
            cost_microcredits,
        } => Some((usage.clone(), *cost_microcredits)),
        _ => None,
    });

    let (usage, cost) = usage.expect("no usage event");
    assert!(usage.output_tokens > 0);
    assert!(cost > 0);
}

#[tokio::test]
async fn provider_failure_surfaces_as_an_error_terminal() {
    // Empty script: the first model turn fails.
    let sup = supervisor(vec![], SupervisorConfig::default());

    let events = collect(sup.spawn_run(input("hi"), None)).await;

    assert!(matches!(events.last(), Some(RunEvent::Error { .. })));
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
}
