use serde::{Deserialize, Serialize};

use crate::api::MessagePayload;

/// Events sent over the realtime channel to subscribed clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChatEvent {
    /// Server confirms the socket is authenticated and ready to subscribe.
    #[serde(rename = "session.ready")]
    Ready { username: String },

    /// A new message was stored for the channel's recipient.
    #[serde(rename = "message.sent")]
    MessageSent(MessagePayload),
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Subscribe to a recipient channel, e.g. `chat.user.alice`.
    Subscribe { channel: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_sent_wire_shape() {
        let event = ChatEvent::MessageSent(MessagePayload {
            id: 7,
            sender_username: "ali".into(),
            recipient_username: "sara".into(),
            message: Some("Hello Sara".into()),
            voice_url: None,
            created_at: "2026-02-19T13:00:44+00:00".into(),
            time: "13:00".into(),
        });

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message.sent");
        assert_eq!(json["data"]["id"], 7);
        assert_eq!(json["data"]["sender_username"], "ali");
        // Ownership is viewer-relative and never serialized by the server.
        assert!(json["data"].get("is_mine").is_none());
    }

    #[test]
    fn subscribe_command_parses() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"action":"subscribe","channel":"chat.user.sara"}"#).unwrap();
        let ClientCommand::Subscribe { channel } = cmd;
        assert_eq!(channel, "chat.user.sara");
    }
}
