use mongodb::Client;
use std::sync::Arc;

use crate::context::ContextBuilder;
use crate::error::{PersistError, Result};
use crate::repositories::{CreditLedger, MessageRepository, ThreadRepository};
use crate::sequence::SequenceAllocator;

const DEFAULT_CONTEXT_TOKENS: usize = 8000;

/// Facade over the persistence layer; everything the gateway and the
/// supervisor need to store or settle a run.
pub struct PersistClient {
    thread_repo: ThreadRepository,
    message_repo: MessageRepository,
    ledger: CreditLedger,
    sequences: Arc<SequenceAllocator>,
    context: ContextBuilder,
}

impl PersistClient {
    pub async fn connect(mongodb_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self::with_client(&client, db_name, DEFAULT_CONTEXT_TOKENS))
    }

    pub async fn connect_with_context_budget(
        mongodb_uri: &str,
        db_name: &str,
        max_context_tokens: usize,
    ) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self::with_client(&client, db_name, max_context_tokens))
    }

    /// Build on an already-connected client; lets callers share the client
    /// with their own collections or probes.
    pub fn with_client(client: &Client, db_name: &str, max_context_tokens: usize) -> Self {
        let thread_repo = ThreadRepository::new(client, db_name);
        let message_repo = MessageRepository::new(client, db_name);
        let context = ContextBuilder::new(
            ThreadRepository::new(client, db_name),
            MessageRepository::new(client, db_name),
            max_context_tokens,
        );

        Self {
            thread_repo,
            message_repo,
            ledger: CreditLedger::new(client, db_name),
            sequences: Arc::new(SequenceAllocator::new(client, db_name)),
            context,
        }
    }

    pub fn threads(&self) -> &ThreadRepository {
        &self.thread_repo
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.message_repo
    }

    pub fn credits(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn sequences(&self) -> &Arc<SequenceAllocator> {
        &self.sequences
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }
}
