//! Wire-format events for the real-time chat gateway.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`. Event
//! names are kebab-case on the wire; clients match on them verbatim, so the
//! serde round trip of each name is covered by tests here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a chat message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }

    /// Parse the database representation. Unknown kinds fall back to text so
    /// a bad row never poisons a broadcast.
    pub fn from_db(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "file" => Self::File,
            _ => Self::Text,
        }
    }
}

/// Events a client may send over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom { room_id: i64 },
    LeaveRoom { room_id: i64 },
    SendMessage(SendMessagePayload),
    TypingStart { room_id: i64 },
    TypingStop { room_id: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessagePayload {
    pub room_id: i64,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageKind,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewMessage(MessagePayload),
    NewRoom(RoomPayload),
    UserTyping(TypingPayload),
    UserStoppedTyping(TypingPayload),
    Error(ErrorPayload),
}

/// A persisted message enriched with the sender's display fields, so clients
/// never need a follow-up profile lookup to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub message: String,
    pub message_type: MessageKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A room with its member summaries resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPayload {
    pub id: i64,
    /// `None` marks a direct (two-person) room.
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub members: Vec<MemberPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user_id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Identity is stamped by the server from the connection's session, never
/// taken from the client payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: i64,
    pub username: String,
    pub room_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ServerEvent {
    /// Scoped error event, the only shape rejection paths emit.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_names_are_kebab_case() {
        let cases = [
            (
                serde_json::to_value(ClientEvent::JoinRoom { room_id: 7 }).unwrap(),
                "join-room",
            ),
            (
                serde_json::to_value(ClientEvent::LeaveRoom { room_id: 7 }).unwrap(),
                "leave-room",
            ),
            (
                serde_json::to_value(ClientEvent::SendMessage(SendMessagePayload {
                    room_id: 7,
                    message: "hi".into(),
                    message_type: MessageKind::Text,
                }))
                .unwrap(),
                "send-message",
            ),
            (
                serde_json::to_value(ClientEvent::TypingStart { room_id: 7 }).unwrap(),
                "typing-start",
            ),
            (
                serde_json::to_value(ClientEvent::TypingStop { room_id: 7 }).unwrap(),
                "typing-stop",
            ),
        ];

        for (value, name) in cases {
            assert_eq!(value["event"], name);
        }
    }

    #[test]
    fn server_event_names_are_kebab_case() {
        let typing = TypingPayload {
            user_id: 1,
            username: "alice".into(),
            room_id: 2,
        };

        let value = serde_json::to_value(ServerEvent::UserTyping(typing.clone())).unwrap();
        assert_eq!(value["event"], "user-typing");
        assert_eq!(value["data"]["user_id"], 1);

        let value = serde_json::to_value(ServerEvent::UserStoppedTyping(typing)).unwrap();
        assert_eq!(value["event"], "user-stopped-typing");

        let value = serde_json::to_value(ServerEvent::error("Access denied")).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["message"], "Access denied");
    }

    #[test]
    fn send_message_kind_defaults_to_text() {
        let frame = r#"{"event":"send-message","data":{"room_id":3,"message":"hello"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();

        match event {
            ClientEvent::SendMessage(payload) => {
                assert_eq!(payload.room_id, 3);
                assert_eq!(payload.message_type, MessageKind::Text);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_fails_to_parse() {
        let frame = r#"{"event":"self-destruct","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(frame).is_err());
    }

    #[test]
    fn message_kind_db_fallback() {
        assert_eq!(MessageKind::from_db("image"), MessageKind::Image);
        assert_eq!(MessageKind::from_db("file"), MessageKind::File);
        assert_eq!(MessageKind::from_db("unknown"), MessageKind::Text);
    }
}
