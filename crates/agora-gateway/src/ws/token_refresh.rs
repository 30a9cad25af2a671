use crate::auth::AuthClient;
use crate::resilience::CircuitBreaker;
use crate::ws::manager::{ConnectionId, WsManager};
use crate::ws::protocol::ServerFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The connection's current access token, shared with the refresh task.
pub struct TokenState {
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Keep a connection's token fresh for as long as it stays open.
///
/// Every `check_interval` the task looks at the token's remaining
/// lifetime. Inside `expiry_margin` it asks the auth service for a
/// replacement (through the circuit breaker) and pushes a
/// `token_refreshed` frame. The task returns once the token is expired
/// and could not be refreshed; the session treats that as a close signal.
pub fn spawn_refresh_task(
    state: Arc<Mutex<TokenState>>,
    auth: AuthClient,
    breaker: Arc<CircuitBreaker>,
    manager: Arc<WsManager>,
    connection_id: ConnectionId,
    check_interval: Duration,
    expiry_margin: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let (token, expires_at) = {
                let state = state.lock().await;
                (state.token.clone(), state.expires_at)
            };

            let now = chrono::Utc::now().timestamp();
            if expires_at <= now {
                tracing::info!(%connection_id, "token expired without refresh, closing");
                return;
            }
            if expires_at - now > expiry_margin.as_secs() as i64 {
                continue;
            }

            match breaker.call(auth.refresh(&token)).await {
                Ok(fresh) => {
                    {
                        let mut state = state.lock().await;
                        state.token = fresh.token.clone();
                        state.expires_at = fresh.expires_at;
                    }
                    manager.send_to_connection(
                        connection_id,
                        ServerFrame::TokenRefreshed {
                            token: fresh.token,
                            expires_at: fresh.expires_at,
                        },
                    );
                    tracing::debug!(%connection_id, "token refreshed");
                }
                Err(e) => {
                    // Retry on the next tick while the token is still valid
                    tracing::warn!(%connection_id, error = %e, "token refresh failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn task_ends_when_the_token_is_already_expired() {
        let state = Arc::new(Mutex::new(TokenState {
            token: "stale".to_string(),
            expires_at: chrono::Utc::now().timestamp() - 10,
        }));
        let manager = Arc::new(WsManager::new());
        let (id, _rx) = manager.register("alice");

        let handle = spawn_refresh_task(
            state,
            AuthClient::new("http://127.0.0.1:1"),
            Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(1))),
            manager,
            id,
            Duration::from_millis(5),
            Duration::from_secs(60),
        );

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresh task should end on expiry")
            .unwrap();
    }

    #[tokio::test]
    async fn healthy_token_keeps_the_task_alive() {
        let state = Arc::new(Mutex::new(TokenState {
            token: "fresh".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        }));
        let manager = Arc::new(WsManager::new());
        let (id, _rx) = manager.register("alice");

        let handle = spawn_refresh_task(
            state,
            AuthClient::new("http://127.0.0.1:1"),
            Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(1))),
            manager,
            id,
            Duration::from_millis(5),
            Duration::from_secs(60),
        );

        let finished = tokio::time::timeout(Duration::from_millis(50), handle).await;
        assert!(finished.is_err(), "task should still be running");
    }
}
