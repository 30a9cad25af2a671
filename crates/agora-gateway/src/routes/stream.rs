use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::runs;
use crate::state::AppState;
use crate::ws::{ServerFrame, WsManager};
use agora_types::RunEvent;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Send a message and stream the run's events back as SSE.
///
/// The same run is also fanned out to the caller's WebSocket connections;
/// SSE is the fallback surface for clients that do not hold a socket open.
#[utoipa::path(
    post,
    path = "/threads/{thread_id}/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Run event stream", content_type = "text/event-stream"),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "Thread not found or not owned by caller")
    ),
    tag = "messages"
)]
pub async fn send_message_stream(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let events = runs::start_run(&state, &user.user_id, &thread_id, &req.content).await?;

    let sse_stream = event_stream(events, Arc::clone(&state.ws), user.user_id);

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// Stream run events as SSE, mirroring each one to the owner's sockets so
/// every surface the user has open sees the run.
fn event_stream(
    events: mpsc::Receiver<RunEvent>,
    ws: Arc<WsManager>,
    user_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(events).map(move |event| {
        ws.send_to_user(&user_id, &ServerFrame::Event { event: event.clone() });
        Ok(to_sse_event(event))
    })
}

fn to_sse_event(event: RunEvent) -> Event {
    let name = match &event {
        RunEvent::RunStarted { .. } => "run_started",
        RunEvent::AgentSelected { .. } => "agent_selected",
        RunEvent::Message { .. } => "message",
        RunEvent::ToolCall { .. } => "tool_call",
        RunEvent::ToolResult { .. } => "tool_result",
        RunEvent::Done { .. } => "done",
        RunEvent::Usage { .. } => "usage",
        RunEvent::Error { .. } => "error",
        RunEvent::RunFinished { .. } => "run_finished",
    };

    match Event::default().event(name).json_data(&event) {
        Ok(sse) => sse,
        Err(e) => {
            tracing::error!(error = %e, "unserializable run event");
            Event::default().event("error").data("serialization failure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sse_runs_mirror_to_the_owners_sockets() {
        let manager = Arc::new(WsManager::new());
        let (_owner, mut owner_rx) = manager.register("alice");
        let (_other, mut other_rx) = manager.register("bob");

        let (tx, rx) = mpsc::channel(8);
        tx.send(RunEvent::Message {
            content: "hi".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        let sse_events: Vec<_> = event_stream(rx, Arc::clone(&manager), "alice".to_string())
            .collect()
            .await;
        assert_eq!(sse_events.len(), 1);

        let frame = owner_rx.recv().await.unwrap();
        assert!(matches!(frame, ServerFrame::Event { .. }));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn sse_event_names_follow_the_run_event_tag() {
        // The SSE event name must match the type tag inside the payload so
        // EventSource listeners and raw JSON consumers agree.
        let event = RunEvent::Message {
            content: "hi".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
    }
}
