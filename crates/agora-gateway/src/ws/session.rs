use crate::error::ApiError;
use crate::runs;
use crate::state::AppState;
use crate::ws::protocol::{ClientFrame, ServerFrame};
use crate::ws::token_refresh::{self, TokenState};
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Access token; browsers cannot set headers on WS upgrades
    token: String,
}

/// `GET /ws`: authenticated WebSocket upgrade.
pub async fn ws_upgrade(
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    check_origin(&headers, &state.config.server.allowed_ws_origins)?;

    let claims = state
        .verifier
        .verify(&query.token)
        .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub, query.token, claims.exp)))
}

/// Reject cross-site upgrades. Origins are compared exactly so crafted
/// hosts like `localhost.evil.com` do not pass; an empty allowlist turns
/// the check off.
fn check_origin(headers: &HeaderMap, allowed: &[String]) -> Result<(), ApiError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Origin header required".to_string()))?;

    if allowed.iter().any(|o| o == origin) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(format!(
            "origin {} not allowed",
            origin
        )))
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    user_id: String,
    token: String,
    expires_at: i64,
) {
    let (connection_id, mut frames) = state.ws.register(&user_id);

    // First sight of a user opens their credit account.
    if let Err(e) = state
        .persist
        .credits()
        .ensure_account(&user_id, state.config.credits.initial_grant)
        .await
    {
        tracing::error!(user = %user_id, error = %e, "failed to ensure credit account");
    }

    let token_state = Arc::new(Mutex::new(TokenState { token, expires_at }));
    let mut refresh = token_refresh::spawn_refresh_task(
        Arc::clone(&token_state),
        state.auth_client.clone(),
        Arc::clone(&state.auth_breaker),
        Arc::clone(&state.ws),
        connection_id,
        state.config.auth.check_interval(),
        state.config.auth.expiry_margin(),
    );

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_frame(&state, &user_id, connection_id, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
            outgoing = frames.recv() => {
                match outgoing {
                    Some(frame) => {
                        let payload = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(error = %e, "unserializable server frame");
                                continue;
                            }
                        };
                        if socket.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // The refresh task only returns when the token expired and
            // could not be renewed.
            _ = &mut refresh => {
                let _ = socket
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::POLICY,
                        reason: "token expired".into(),
                    })))
                    .await;
                break;
            }
        }
    }

    refresh.abort();
    state.ws.unregister(connection_id);
}

async fn handle_client_frame(
    state: &Arc<AppState>,
    user_id: &str,
    connection_id: crate::ws::ConnectionId,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            state.ws.send_to_connection(
                connection_id,
                ServerFrame::Error {
                    message: format!("malformed frame: {}", e),
                },
            );
            return;
        }
    };

    match frame {
        ClientFrame::Ping => {
            state.ws.send_to_connection(connection_id, ServerFrame::Pong);
        }
        ClientFrame::SendMessage { thread_id, content } => {
            match runs::start_run(state, user_id, &thread_id, &content).await {
                Ok(mut events) => {
                    // Fan out through the manager so every socket the
                    // owner has open sees the run.
                    let ws = Arc::clone(&state.ws);
                    let user = user_id.to_string();
                    tokio::spawn(async move {
                        while let Some(event) = events.recv().await {
                            ws.send_to_user(&user, &ServerFrame::Event { event });
                        }
                    });
                }
                Err(e) => {
                    state.ws.send_to_connection(
                        connection_id,
                        ServerFrame::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
    }
}
