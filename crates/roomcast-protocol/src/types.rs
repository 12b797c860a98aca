//! Identity types and handshake frames.
//!
//! Everything here is a "newtype wrapper" or a plain data enum that
//! travels on the wire. Room and user ids are opaque strings handed to us
//! by whatever manages rooms and users outside this system; we never look
//! inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a chat room.
///
/// `#[serde(transparent)]` makes `RoomId("lobby")` serialize as just
/// `"lobby"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An already-authenticated `(user id, display name)` pair.
///
/// Produced upstream (by an authenticator) and handed to each client when
/// it is built. The server stamps it onto every parsed message the client
/// sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.user_id)
    }
}

// ---------------------------------------------------------------------------
// SystemMessage: connection setup frames
// ---------------------------------------------------------------------------

/// Frames exchanged before a connection joins a room.
///
/// Internally tagged, so a handshake reads:
/// `{ "type": "Handshake", "room_id": "lobby", "token": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: "Put me in this room; here is who I am."
    Handshake { room_id: RoomId, token: String },

    /// Server → Client: "You're in."
    HandshakeAck { room_id: RoomId, user_id: UserId },

    /// Server → Client: "Something went wrong." HTTP-style codes
    /// (400 bad handshake, 401 unauthorized, 408 too slow).
    Error { code: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_is_transparent() {
        let json = serde_json::to_string(&RoomId::from("lobby")).unwrap();
        assert_eq!(json, "\"lobby\"");
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId::from("u1").to_string(), "u1");
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::new("u1", "alice");
        assert_eq!(id.to_string(), "alice (u1)");
    }

    #[test]
    fn test_handshake_deserialize() {
        let json = r#"{"type":"Handshake","room_id":"r1","token":"u1:alice"}"#;
        let msg: SystemMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            SystemMessage::Handshake {
                room_id: RoomId::from("r1"),
                token: "u1:alice".into(),
            }
        );
    }

    #[test]
    fn test_error_serialize() {
        let msg = SystemMessage::Error {
            code: 401,
            message: "unauthorized".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"Error\""));
        assert!(json.contains("\"code\":401"));
    }
}
