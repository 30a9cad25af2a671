pub mod config;
pub mod events;
pub mod state;

pub use config::{ContextPolicy, LlmSettings, SupervisorConfig};
pub use events::RunEvent;
pub use state::{RunInput, RunState};
