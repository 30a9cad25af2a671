use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use agora_persist::{MessageKind, MessageRecord, MessageRole, Thread};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

const DEFAULT_THREAD_LIMIT: i64 = 50;
const DEFAULT_MESSAGE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Thread> for ThreadResponse {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id.to_hex(),
            title: thread.title,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

/// Single-thread view; includes the stored message count.
#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadDetailResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub seq: i64,
    pub role: String,
    pub kind: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for MessageResponse {
    fn from(record: MessageRecord) -> Self {
        let role = match record.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        let kind = match record.kind {
            MessageKind::Message => "message",
            MessageKind::ToolCall => "tool_call",
            MessageKind::ToolResult => "tool_result",
        };
        Self {
            id: record.id.to_hex(),
            seq: record.seq,
            role: role.to_string(),
            kind: kind.to_string(),
            content: record.content,
            agent: record.agent,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    /// Return messages with seq strictly below this, for backward paging
    pub before_seq: Option<i64>,
}

fn parse_thread_id(thread_id: &str) -> ApiResult<ObjectId> {
    ObjectId::parse_str(thread_id)
        .map_err(|_| ApiError::BadRequest("invalid thread id".to_string()))
}

/// Create a thread owned by the caller.
#[utoipa::path(
    post,
    path = "/threads",
    request_body = CreateThreadRequest,
    responses(
        (status = 200, description = "Thread created", body = ThreadResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "threads"
)]
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<Json<ThreadResponse>> {
    state
        .persist
        .credits()
        .ensure_account(&user.user_id, state.config.credits.initial_grant)
        .await?;

    let thread = state
        .persist
        .threads()
        .create_thread(user.user_id, req.title)
        .await?;

    Ok(Json(thread.into()))
}

/// List the caller's threads, most recently touched first.
#[utoipa::path(
    get,
    path = "/threads",
    responses((status = 200, description = "Caller's threads", body = [ThreadResponse])),
    tag = "threads"
)]
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ThreadResponse>>> {
    let threads = state
        .persist
        .threads()
        .list_threads(&user.user_id, DEFAULT_THREAD_LIMIT)
        .await?;

    Ok(Json(threads.into_iter().map(Into::into).collect()))
}

/// Fetch one of the caller's threads with its message count.
#[utoipa::path(
    get,
    path = "/threads/{thread_id}",
    responses(
        (status = 200, description = "Thread", body = ThreadDetailResponse),
        (status = 404, description = "Not found or not owned by caller")
    ),
    tag = "threads"
)]
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadDetailResponse>> {
    let oid = parse_thread_id(&thread_id)?;
    let thread = state
        .persist
        .threads()
        .get_owned_thread(oid, &user.user_id)
        .await?
        .ok_or(ApiError::ThreadNotFound(thread_id))?;

    let message_count = state.persist.messages().count_messages(oid).await?;

    Ok(Json(ThreadDetailResponse {
        id: thread.id.to_hex(),
        title: thread.title,
        created_at: thread.created_at,
        updated_at: thread.updated_at,
        message_count,
    }))
}

/// Delete one of the caller's threads and its messages.
#[utoipa::path(
    delete,
    path = "/threads/{thread_id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned by caller")
    ),
    tag = "threads"
)]
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult<axum::http::StatusCode> {
    let oid = parse_thread_id(&thread_id)?;
    state
        .persist
        .threads()
        .get_owned_thread(oid, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::ThreadNotFound(thread_id.clone()))?;

    state.persist.threads().delete_thread(oid).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// List a thread's messages in sequence order.
#[utoipa::path(
    get,
    path = "/threads/{thread_id}/messages",
    responses(
        (status = 200, description = "Messages in seq order", body = [MessageResponse]),
        (status = 404, description = "Not found or not owned by caller")
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let oid = parse_thread_id(&thread_id)?;
    state
        .persist
        .threads()
        .get_owned_thread(oid, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::ThreadNotFound(thread_id.clone()))?;

    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).clamp(1, 500);
    let messages = state
        .persist
        .messages()
        .get_messages_paginated(oid, limit, query.before_seq)
        .await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
