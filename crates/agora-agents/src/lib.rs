pub mod agent;
pub mod node;
pub mod nodes;
pub mod router;
pub mod supervisor;
pub mod tools;

pub use agent::{AgentProfile, AgentRegistry};
pub use node::{EventSender, Node, NodeType};
pub use router::{NextNode, Router, SupervisorRouter};
pub use supervisor::{RunContext, Supervisor};
pub use tools::{ClockTool, ToolExecutor, ToolOutcome, ToolRegistry};

// Re-export the shared run types alongside the orchestrator.
pub use agora_types::{RunEvent, RunInput, RunState, SupervisorConfig};
