//! JSON wire protocol for the collaboration server.
//!
//! Every frame is a text WebSocket message holding an adjacently tagged
//! envelope:
//! ```text
//! ┌──────────────────────┬──────────────────────────────┐
//! │ "event": "<name>"    │ "data": { event payload }    │
//! └──────────────────────┴──────────────────────────────┘
//! ```
//!
//! Outbound frames are [`ClientMessage`], inbound frames are [`ServerMessage`].
//! Unknown events and malformed payloads decode to [`ProtocolError`] so the
//! caller can log and drop them without disturbing the session.

use serde::{Deserialize, Serialize};

/// Edit primitive carried by a [`CollaborationOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Delete,
    Replace,
}

/// The caller-supplied part of an operation.
///
/// The channel fills in id, acting user and timestamp when it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDraft {
    pub kind: OperationKind,
    pub position: u64,
    pub content: Option<String>,
    /// Number of characters affected (delete/replace).
    pub length: Option<u64>,
}

impl OperationDraft {
    /// Insert `content` at `position`.
    pub fn insert(position: u64, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Insert,
            position,
            content: Some(content.into()),
            length: None,
        }
    }

    /// Delete `length` characters starting at `position`.
    pub fn delete(position: u64, length: u64) -> Self {
        Self {
            kind: OperationKind::Delete,
            position,
            content: None,
            length: Some(length),
        }
    }

    /// Replace `length` characters at `position` with `content`.
    pub fn replace(position: u64, length: u64, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Replace,
            position,
            content: Some(content.into()),
            length: Some(length),
        }
    }
}

/// A single edit as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationOperation {
    /// Client-generated, unique within the session.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub position: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    pub user_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Inbound broadcast of an operation, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationUpdate {
    pub operation_id: String,
    pub user_id: String,
    pub operation: CollaborationOperation,
    pub timestamp: i64,
}

/// Room member as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Participant {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
        }
    }
}

/// Caret location inside the shared chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Frames sent by this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        token: String,
    },
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    CollaborationOperation {
        room_id: String,
        operation: CollaborationOperation,
    },
    CursorUpdate {
        room_id: String,
        position: TextPosition,
    },
    Ping {},
}

impl ClientMessage {
    /// Create an authenticate frame.
    pub fn authenticate(token: impl Into<String>) -> Self {
        Self::Authenticate {
            token: token.into(),
        }
    }

    /// Create a join frame.
    pub fn join_room(room_id: impl Into<String>) -> Self {
        Self::JoinRoom {
            room_id: room_id.into(),
        }
    }

    /// Create a leave frame.
    pub fn leave_room(room_id: impl Into<String>) -> Self {
        Self::LeaveRoom {
            room_id: room_id.into(),
        }
    }

    /// Create a heartbeat ping.
    pub fn ping() -> Self {
        Self::Ping {}
    }

    /// Wire name of the event, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::CollaborationOperation { .. } => "collaboration_operation",
            Self::CursorUpdate { .. } => "cursor_update",
            Self::Ping {} => "ping",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Frames received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Authenticated {
        user_id: String,
    },
    AuthError {
        message: String,
    },
    RoomJoined {
        room_id: String,
        #[serde(default)]
        participant_count: usize,
        #[serde(default)]
        participants: Vec<Participant>,
    },
    UserJoined {
        room_id: String,
        user: Participant,
    },
    UserLeft {
        room_id: String,
        user_id: String,
    },
    CollaborationUpdate(CollaborationUpdate),
    CursorMoved {
        user_id: String,
        position: TextPosition,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Wire name of the event, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "authenticated",
            Self::AuthError { .. } => "auth_error",
            Self::RoomJoined { .. } => "room_joined",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::CollaborationUpdate(_) => "collaboration_update",
            Self::CursorMoved { .. } => "cursor_moved",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Wire format errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
