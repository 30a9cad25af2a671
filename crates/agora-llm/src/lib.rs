pub mod types;
pub mod traits;
pub mod streaming;
pub mod openai;
pub mod provider;
pub mod router;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenStream, TokenUsage};
pub use streaming::TokenEvent;
pub use openai::OpenAiClient;
pub use provider::{ProviderConfig, ClientFactory};
pub use router::{ModelRouter, CostTable, ModelRate};
pub use types::{Message, Tool, ToolCall, ToolChoice, FunctionCall, FunctionDefinition};
