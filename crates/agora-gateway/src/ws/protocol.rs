use agora_types::RunEvent;
use serde::{Deserialize, Serialize};

/// Frame sent by a client over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start a run on one of the caller's threads
    SendMessage { thread_id: String, content: String },
    Ping,
}

/// Frame pushed to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A run event, fanned out to every connection of the thread owner
    Event { event: RunEvent },

    /// Replacement access token minted by the background refresh task
    TokenRefreshed { token: String, expires_at: i64 },

    Error { message: String },

    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_parse_from_tagged_json() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"send_message","thread_id":"abc","content":"hi"}"#)
                .unwrap();
        assert!(matches!(frame, ClientFrame::SendMessage { ref content, .. } if content == "hi"));

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));
    }

    #[test]
    fn unknown_client_frame_is_an_error() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe"}"#).is_err());
    }

    #[test]
    fn server_event_frame_nests_the_run_event() {
        let frame = ServerFrame::Event {
            event: RunEvent::Message {
                content: "hello".to_string(),
            },
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"]["type"], "message");
        assert_eq!(value["event"]["content"], "hello");
    }

    #[test]
    fn token_refreshed_frame_shape() {
        let frame = ServerFrame::TokenRefreshed {
            token: "t".to_string(),
            expires_at: 1_700_000_000,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "token_refreshed");
        assert_eq!(value["expires_at"], 1_700_000_000);
    }
}
