use crate::node::{EventSender, Node, NodeType};
use crate::tools::ToolRegistry;
use agora_types::{RunEvent, RunState};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Executes every pending tool call and feeds the results back into state
/// so the next model turn can see them.
pub struct ToolNode {
    tools: Arc<ToolRegistry>,
}

impl ToolNode {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn execute(&self, state: &mut RunState, event_tx: EventSender) -> Result<()> {
        let calls = state.pending_tool_calls();

        for call in calls {
            let outcome = self.tools.execute_call(&call).await;

            event_tx
                .send(RunEvent::ToolResult {
                    tool_call_id: outcome.tool_call_id.clone(),
                    result: outcome.result.clone(),
                    is_error: outcome.is_error,
                    duration_ms: outcome.duration_ms,
                })
                .await?;

            // Errors go back to the model as tool output; it can retry or
            // answer without the tool.
            state.add_tool_result(outcome.tool_call_id, outcome.result);
        }

        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::Tool
    }
}
