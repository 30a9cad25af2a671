use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use agora_agents::supervisor::RunContext;
use agora_persist::{MessageKind, MessageRecord, MessageRole};
use agora_types::{ContextPolicy, RunEvent, RunInput};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Golden path shared by the SSE route and the WebSocket session: verify
/// ownership, persist the user message with its sequence number, replay
/// context, and hand the run to the supervisor.
pub async fn start_run(
    state: &Arc<AppState>,
    user_id: &str,
    thread_id: &str,
    content: &str,
) -> ApiResult<mpsc::Receiver<RunEvent>> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("message content is empty".to_string()));
    }

    let thread_oid = ObjectId::parse_str(thread_id)
        .map_err(|_| ApiError::BadRequest("invalid thread id".to_string()))?;

    state
        .persist
        .threads()
        .get_owned_thread(thread_oid, user_id)
        .await?
        .ok_or_else(|| ApiError::ThreadNotFound(thread_id.to_string()))?;

    let scope = format!("message:{}", thread_oid.to_hex());
    let seq = state.persist.sequences().next(&scope).await? as i64;

    state
        .persist
        .messages()
        .save_message(MessageRecord {
            id: ObjectId::new(),
            thread_id: thread_oid,
            user_id: user_id.to_string(),
            seq,
            role: MessageRole::User,
            kind: MessageKind::Message,
            content: content.to_string(),
            agent: None,
            tool_call_id: None,
            tool_name: None,
            created_at: chrono::Utc::now(),
            duration_ms: None,
        })
        .await?;
    state.persist.threads().touch_thread(thread_oid).await?;

    let history = state
        .persist
        .context()
        .context_for(thread_oid, &ContextPolicy::default())
        .await?;

    let input = RunInput::new(thread_oid.to_hex(), history);
    let ctx = RunContext {
        thread_id: thread_oid,
        user_id: user_id.to_string(),
    };

    Ok(state.supervisor.spawn_run(input, Some(ctx)))
}
