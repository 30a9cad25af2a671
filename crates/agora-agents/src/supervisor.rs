use crate::agent::AgentRegistry;
use crate::node::{Node, NodeType};
use crate::nodes::{LlmNode, ToolNode};
use crate::router::{NextNode, Router, SupervisorRouter};
use crate::tools::ToolRegistry;
use agora_llm::{Message, ModelRouter};
use agora_persist::{MessageKind, MessageRecord, MessageRole, PersistClient, PersistError};
use agora_types::{RunEvent, RunInput, RunState, SupervisorConfig};
use anyhow::Result;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Identifies whose thread a run writes to.
pub struct RunContext {
    pub thread_id: ObjectId,
    pub user_id: String,
}

/// Orchestrates a run: picks an agent, drives the node loop, persists what
/// the agents produce, and settles the cost against the credit ledger.
pub struct Supervisor {
    registry: Arc<AgentRegistry>,
    models: Arc<ModelRouter>,
    tools: Arc<ToolRegistry>,
    config: SupervisorConfig,
    persist: Option<Arc<PersistClient>>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        models: Arc<ModelRouter>,
        tools: Arc<ToolRegistry>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            registry,
            models,
            tools,
            config,
            persist: None,
        }
    }

    /// Enable persistence and credit settlement. Runs started without a
    /// `RunContext` stay ephemeral even when this is set.
    pub fn with_persistence(mut self, persist: Arc<PersistClient>) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Start a run in the background and return its event stream.
    ///
    /// The stream always carries exactly one `run_started` and exactly one
    /// terminal event (`run_finished` or `error`), whatever happens inside.
    pub fn spawn_run(&self, input: RunInput, ctx: Option<RunContext>) -> mpsc::Receiver<RunEvent> {
        let (tx, rx) = mpsc::channel(1000);

        let registry = Arc::clone(&self.registry);
        let models = Arc::clone(&self.models);
        let tools = Arc::clone(&self.tools);
        let config = self.config.clone();
        let persist = self.persist.clone();

        tokio::spawn(async move {
            let timeout = config.execution_timeout;
            let result = tokio::time::timeout(
                timeout,
                Self::execute_loop(input, tx.clone(), registry, models, tools, config, persist, ctx),
            )
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = tx
                        .send(RunEvent::Error {
                            message: e.to_string(),
                            agent: None,
                        })
                        .await;
                }
                Err(_) => {
                    let _ = tx
                        .send(RunEvent::Error {
                            message: format!("run timed out after {}s", timeout.as_secs()),
                            agent: None,
                        })
                        .await;
                }
            }
        });

        rx
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_loop(
        input: RunInput,
        event_tx: mpsc::Sender<RunEvent>,
        registry: Arc<AgentRegistry>,
        models: Arc<ModelRouter>,
        tools: Arc<ToolRegistry>,
        config: SupervisorConfig,
        persist: Option<Arc<PersistClient>>,
        ctx: Option<RunContext>,
    ) -> Result<()> {
        let start_time = Instant::now();

        let trigger = input
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or("");
        let (agent, reason) = registry.select(trigger);
        let agent_name = agent.name.clone();

        let mut messages = vec![Message::system(&agent.system_prompt)];
        messages.extend(input.messages);
        let input = RunInput::new(input.thread_id, messages);

        let mut state = RunState::from_input(input, &agent_name, agent.llm_settings());

        event_tx
            .send(RunEvent::RunStarted {
                run_id: state.run_id.clone(),
                thread_id: state.thread_id.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            })
            .await?;
        event_tx
            .send(RunEvent::AgentSelected {
                agent: agent_name.clone(),
                reason,
            })
            .await?;

        let llm_node = LlmNode::new(Arc::clone(&models), tools.llm_tools(&agent.tools));
        let tool_node = ToolNode::new(Arc::clone(&tools));
        let router = SupervisorRouter;

        let mut current = NodeType::Llm;
        let mut iteration = 0;

        loop {
            if iteration >= config.max_iterations {
                event_tx
                    .send(RunEvent::Error {
                        message: format!("max iterations ({}) reached", config.max_iterations),
                        agent: Some(agent_name),
                    })
                    .await?;
                return Ok(());
            }

            let messages_before = state.messages.len();

            match current {
                NodeType::Llm => llm_node.execute(&mut state, event_tx.clone()).await?,
                NodeType::Tool => tool_node.execute(&mut state, event_tx.clone()).await?,
            }

            if let (Some(persist), Some(ctx)) = (&persist, &ctx) {
                Self::persist_new_messages(persist, ctx, &state, messages_before, &agent_name)
                    .await?;
            }

            match router.next(&state, current) {
                NextNode::End => break,
                NextNode::Llm => current = NodeType::Llm,
                NextNode::Tool => current = NodeType::Tool,
            }

            iteration += 1;
        }

        let cost = models.costs().cost_of(&state.llm.model, &state.usage);
        event_tx
            .send(RunEvent::Usage {
                usage: state.usage.clone(),
                cost_microcredits: cost,
            })
            .await?;

        if let (Some(persist), Some(ctx)) = (&persist, &ctx) {
            let description = format!("run {} ({})", state.run_id, state.llm.model);
            match persist
                .credits()
                .debit(&ctx.user_id, cost as i64, Some(&state.run_id), &description)
                .await
            {
                Ok(()) => {}
                Err(PersistError::InsufficientCredits { needed, available, .. }) => {
                    event_tx
                        .send(RunEvent::Error {
                            message: format!(
                                "insufficient credits: run cost {} but balance is {}",
                                needed, available
                            ),
                            agent: Some(agent_name),
                        })
                        .await?;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        event_tx
            .send(RunEvent::RunFinished {
                status: "success".to_string(),
                total_duration_ms: start_time.elapsed().as_millis() as u64,
            })
            .await?;

        Ok(())
    }

    /// Persist the messages a node appended to state.
    ///
    /// Sequence numbers are allocated here, in emission order, so readers
    /// replaying the thread see the same order clients streamed. The batch
    /// insert itself is fire-and-forget.
    async fn persist_new_messages(
        persist: &Arc<PersistClient>,
        ctx: &RunContext,
        state: &RunState,
        messages_before: usize,
        agent_name: &str,
    ) -> Result<()> {
        let scope = format!("message:{}", ctx.thread_id.to_hex());

        let mut records = Vec::new();
        for message in state.messages.iter().skip(messages_before) {
            for mut record in Self::to_records(message, ctx, agent_name) {
                record.seq = persist.sequences().next(&scope).await? as i64;
                records.push(record);
            }
        }

        if !records.is_empty() {
            let repo = persist.messages().clone();
            tokio::spawn(async move {
                if let Err(e) = repo.save_messages(records).await {
                    tracing::error!(error = %e, "failed to persist run messages");
                }
            });
        }

        Ok(())
    }

    /// One stored record per visible artifact: assistant text, each tool
    /// call, and each tool result.
    fn to_records(message: &Message, ctx: &RunContext, agent_name: &str) -> Vec<MessageRecord> {
        let base = |kind: MessageKind, content: String| MessageRecord {
            id: ObjectId::new(),
            thread_id: ctx.thread_id,
            user_id: ctx.user_id.clone(),
            seq: 0,
            role: MessageRole::Assistant,
            kind,
            content,
            agent: Some(agent_name.to_string()),
            tool_call_id: None,
            tool_name: None,
            created_at: chrono::Utc::now(),
            duration_ms: None,
        };

        match message {
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut records = Vec::new();
                if let Some(text) = content {
                    if !text.is_empty() {
                        records.push(base(MessageKind::Message, text.clone()));
                    }
                }
                if let Some(calls) = tool_calls {
                    for call in calls {
                        let mut record =
                            base(MessageKind::ToolCall, call.function.arguments.clone());
                        record.tool_call_id = Some(call.id.clone());
                        record.tool_name = Some(call.function.name.clone());
                        records.push(record);
                    }
                }
                records
            }
            Message::Tool {
                tool_call_id,
                content,
            } => {
                let mut record = base(MessageKind::ToolResult, content.clone());
                record.tool_call_id = Some(tool_call_id.clone());
                vec![record]
            }
            // User messages are persisted by the gateway before the run
            // starts; system prompts are never stored.
            _ => Vec::new(),
        }
    }
}
