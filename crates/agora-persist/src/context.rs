// Context-window assembly for runs.

use mongodb::bson::oid::ObjectId;

use agora_llm::Message as LlmMessage;
use agora_types::ContextPolicy;

use crate::error::{PersistError, Result};
use crate::models::{MessageKind, MessageRecord, MessageRole};
use crate::repositories::{MessageRepository, ThreadRepository};

/// Replays stored history into LLM messages for a new run.
///
/// Token budgeting uses the chars/4 estimate; when the window blows the
/// budget, older messages are dropped from the front (the policy already
/// bounds how much is fetched).
pub struct ContextBuilder {
    thread_repo: ThreadRepository,
    message_repo: MessageRepository,
    max_tokens: usize,
}

impl ContextBuilder {
    pub fn new(
        thread_repo: ThreadRepository,
        message_repo: MessageRepository,
        max_tokens: usize,
    ) -> Self {
        Self {
            thread_repo,
            message_repo,
            max_tokens,
        }
    }

    /// History for `thread_id` as LLM messages, oldest first.
    ///
    /// Tool-call and tool-result rows are not replayed; they only matter
    /// inside the run that produced them.
    pub async fn context_for(
        &self,
        thread_id: ObjectId,
        policy: &ContextPolicy,
    ) -> Result<Vec<LlmMessage>> {
        let thread = self
            .thread_repo
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;

        let records = match policy {
            ContextPolicy::LastK { k } => {
                self.message_repo
                    .get_messages_paginated(thread.id, *k as i64, None)
                    .await?
            }
            ContextPolicy::AllMessages => self.message_repo.get_messages(thread.id).await?,
        };

        let mut messages = Self::to_llm_messages(&records);
        self.enforce_budget(&mut messages);
        Ok(messages)
    }

    fn to_llm_messages(records: &[MessageRecord]) -> Vec<LlmMessage> {
        records
            .iter()
            .filter(|r| r.kind == MessageKind::Message)
            .map(|r| match r.role {
                MessageRole::User => LlmMessage::user(r.content.clone()),
                MessageRole::Assistant => LlmMessage::assistant(r.content.clone()),
            })
            .collect()
    }

    fn enforce_budget(&self, messages: &mut Vec<LlmMessage>) {
        let token_count = |m: &LlmMessage| m.text().map(|t| t.len() / 4).unwrap_or(0);

        let mut total: usize = messages.iter().map(token_count).sum();
        while total > self.max_tokens && messages.len() > 1 {
            let dropped = messages.remove(0);
            total -= token_count(&dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(role: MessageRole, kind: MessageKind, content: &str, seq: i64) -> MessageRecord {
        MessageRecord {
            id: ObjectId::new(),
            thread_id: ObjectId::new(),
            user_id: "u1".to_string(),
            seq,
            role,
            kind,
            content: content.to_string(),
            agent: None,
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
            duration_ms: None,
        }
    }

    #[test]
    fn tool_rows_are_not_replayed() {
        let records = vec![
            record(MessageRole::User, MessageKind::Message, "hi", 1),
            record(MessageRole::Assistant, MessageKind::ToolCall, "", 2),
            record(MessageRole::Assistant, MessageKind::ToolResult, "3pm", 3),
            record(MessageRole::Assistant, MessageKind::Message, "it is 3pm", 4),
        ];

        let messages = ContextBuilder::to_llm_messages(&records);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), "user");
        assert_eq!(messages[1].role(), "assistant");
    }
}
