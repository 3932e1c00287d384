//! Wire protocol: inbound request envelopes and outbound broadcast events.
//!
//! Inbound messages are modeled as one tagged enum so an unrecognized shape
//! is a `ParseError` at the deserialization boundary rather than something
//! handlers have to guess about. Outbound events mirror the table in the
//! socket event protocol one-for-one.

use serde::{Deserialize, Serialize};

use crate::queue::{QueueStatus, StackStatus};
use crate::timer::TimerStatus;

/// A connection's stable identity, assigned on connect.
///
/// Formatted as `ws-<n>` to match the id scheme this codebase already uses
/// for WebSocket connections (see the connection manager's `register`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Inbound events a connected client can send.
///
/// `request_chatmessage` carries both plain chat and `/command` text; the
/// dispatcher decides which at the handler boundary, not here (see
/// `command::parse_command`).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    #[serde(rename = "request_updateusername")]
    RequestUpdateUsername { username: String },
    #[serde(rename = "request_chatmessage")]
    RequestChatMessage { message: String },
    #[serde(rename = "request_authorization")]
    RequestAuthorization,
    #[serde(rename = "request_queuesync")]
    RequestQueueSync,
    #[serde(rename = "request_stacksync")]
    RequestStackSync,
    #[serde(rename = "request_streamsync")]
    RequestStreamSync,
    #[serde(rename = "request_userlist")]
    RequestUserList,
    #[serde(rename = "streamdata")]
    StreamData { info: serde_json::Value },
}

/// Canonical serialized snapshot of a room's playback state.
///
/// Sent as the `extra` payload of `streamload` and `streamsync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub kind: String,
    pub queue_length: usize,
    pub started_by: String,
    pub stream_url: String,
    pub stream_duration: u64,
    pub playback: TimerStatus,
}

/// One entry of the `userlist` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListEntry {
    pub username: Option<String>,
    pub id: ConnectionId,
    pub room: String,
    pub roles: Vec<String>,
}

/// `extra` payload of `chatmessage`: the text with embedded image URLs split
/// out of it.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ChatExtra {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Outbound events broadcast to one or more clients.
///
/// `id` is the connection id of the client the event is *about* for
/// identity-shaped events (joined/left/error/chat), and the room/namespace
/// name for playback-shaped events (streamload/streamsync/queuesync/
/// stacksync) — the spec's wire table names the field `id` for both without
/// distinguishing the two; this crate picks the reading that lets a client
/// tell "who" from "which room" apart without a second lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "info_clientjoined")]
    InfoClientJoined { id: ConnectionId },
    #[serde(rename = "info_clientleft")]
    InfoClientLeft { id: ConnectionId, from: String },
    #[serde(rename = "info_clienterror")]
    InfoClientError {
        id: ConnectionId,
        from: &'static str,
        message: String,
    },
    #[serde(rename = "chatmessage")]
    ChatMessage {
        id: ConnectionId,
        from: String,
        message: String,
        extra: ChatExtra,
    },
    #[serde(rename = "streamload")]
    StreamLoad {
        id: String,
        from: &'static str,
        extra: StatusRecord,
    },
    #[serde(rename = "streamsync")]
    StreamSync { id: String, extra: StatusRecord },
    #[serde(rename = "queuesync")]
    QueueSync {
        id: String,
        from: &'static str,
        extra: QueueStatus,
    },
    #[serde(rename = "stacksync")]
    StackSync {
        id: String,
        from: &'static str,
        extra: StackStatus,
    },
    #[serde(rename = "userlist")]
    UserList { clients: Vec<UserListEntry> },
    #[serde(rename = "httprequest")]
    HttpRequest { kind: &'static str, endpoint: String },
}

impl OutboundEvent {
    pub fn stream_load(namespace: &str, status: StatusRecord) -> Self {
        Self::StreamLoad {
            id: namespace.to_string(),
            from: "system",
            extra: status,
        }
    }

    pub fn stream_sync(namespace: &str, status: StatusRecord) -> Self {
        Self::StreamSync {
            id: namespace.to_string(),
            extra: status,
        }
    }

    pub fn system_message(id: ConnectionId, text: impl Into<String>) -> Self {
        Self::ChatMessage {
            id,
            from: "system".to_string(),
            message: text.into(),
            extra: ChatExtra::default(),
        }
    }

    pub fn client_error(id: ConnectionId, message: impl Into<String>) -> Self {
        Self::InfoClientError {
            id,
            from: "system",
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_serializes_as_ws_prefixed_string() {
        let id = ConnectionId(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ws-7\"");
    }

    #[test]
    fn status_record_round_trips_through_json() {
        let record = StatusRecord {
            kind: "youtube".into(),
            queue_length: 2,
            started_by: "alice".into(),
            stream_url: "https://youtu.be/ABC".into(),
            stream_duration: 120,
            playback: TimerStatus {
                state: crate::timer::TimerState::Playing,
                time: 10,
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: StatusRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn unknown_inbound_shape_fails_to_parse() {
        let result: Result<InboundEvent, _> = serde_json::from_str(r#"{"type":"not_a_thing"}"#);
        assert!(result.is_err());
    }
}
