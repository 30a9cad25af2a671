use agora_types::{RunEvent, RunState};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub type EventSender = mpsc::Sender<RunEvent>;

/// A unit of work in the run loop.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute the node's logic, mutating state and emitting events as it goes
    async fn execute(&self, state: &mut RunState, event_tx: EventSender) -> Result<()>;

    fn node_type(&self) -> NodeType;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Llm,
    Tool,
}
