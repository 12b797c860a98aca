//! The chat message document and its per-viewer rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Codec, Identity, ProtocolError, UserId};

/// Field names the server owns. A client can't smuggle these in through
/// the free-form metadata.
const RESERVED_FIELDS: &[&str] = &["is_self"];

/// A chat message as it travels through a room.
///
/// Only `chat_message` is required. `sender_id` and `sender_name` are
/// stamped by the server from the authenticated identity of the client
/// that sent it; a message without them came from no one in particular
/// (a system notice or a raw forward). Any other fields are kept in
/// `metadata` and written back out as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub chat_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ChatMessage {
    /// A message with text only: no sender, no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            chat_message: text.into(),
            sender_id: None,
            sender_name: None,
            metadata: Map::new(),
        }
    }

    /// Decodes a message, dropping any server-owned fields from the
    /// metadata.
    ///
    /// # Errors
    /// Fails if the payload is not a document with a string
    /// `chat_message` field.
    pub fn decode<C: Codec>(codec: &C, data: &[u8]) -> Result<Self, ProtocolError> {
        let mut msg: Self = codec.decode(data)?;
        for field in RESERVED_FIELDS {
            msg.metadata.remove(*field);
        }
        Ok(msg)
    }

    /// Overwrites the sender fields with `identity`.
    pub fn stamp(&mut self, identity: &Identity) {
        self.sender_id = Some(identity.user_id.clone());
        self.sender_name = Some(identity.display_name.clone());
    }

    /// Returns `true` if the message carries no sender.
    pub fn is_system(&self) -> bool {
        self.sender_id.is_none()
    }

    /// Returns `true` if `identity` sent this message.
    pub fn is_authored_by(&self, identity: &Identity) -> bool {
        self.sender_id.as_ref() == Some(&identity.user_id)
    }
}

/// A chat message as one viewer sees it.
///
/// Same fields as [`ChatMessage`] plus `is_self`, which tells the viewer
/// whether they wrote it (clients use it to align their own bubbles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub chat_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub is_self: bool,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RenderedMessage {
    pub fn for_viewer(msg: &ChatMessage, viewer: &Identity) -> Self {
        Self {
            chat_message: msg.chat_message.clone(),
            sender_id: msg.sender_id.clone(),
            sender_name: msg.sender_name.clone(),
            is_self: msg.is_authored_by(viewer),
            metadata: msg.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonCodec;

    #[test]
    fn test_decode_text_only() {
        let msg = ChatMessage::decode(&JsonCodec, br#"{"chat_message":"hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::new("hi"));
        assert!(msg.is_system());
    }

    #[test]
    fn test_decode_keeps_unknown_fields() {
        let msg = ChatMessage::decode(
            &JsonCodec,
            br#"{"chat_message":"hi","reply_to":"m-7","HEADERS":{"HX-Request":"true"}}"#,
        )
        .unwrap();
        assert_eq!(msg.metadata.get("reply_to"), Some(&Value::from("m-7")));
        assert!(msg.metadata.contains_key("HEADERS"));

        let out = String::from_utf8(JsonCodec.encode(&msg).unwrap()).unwrap();
        assert!(out.contains("\"reply_to\":\"m-7\""));
    }

    #[test]
    fn test_decode_strips_reserved_fields() {
        let msg =
            ChatMessage::decode(&JsonCodec, br#"{"chat_message":"hi","is_self":true}"#).unwrap();
        assert!(!msg.metadata.contains_key("is_self"));
    }

    #[test]
    fn test_decode_rejects_missing_text() {
        assert!(ChatMessage::decode(&JsonCodec, br#"{"text":"hi"}"#).is_err());
        assert!(ChatMessage::decode(&JsonCodec, br#"{"chat_message":42}"#).is_err());
        assert!(ChatMessage::decode(&JsonCodec, b"hello").is_err());
    }

    #[test]
    fn test_stamp_overwrites_client_supplied_sender() {
        let mut msg = ChatMessage::decode(
            &JsonCodec,
            br#"{"chat_message":"hi","sender_id":"mallory","sender_name":"admin"}"#,
        )
        .unwrap();
        let alice = Identity::new("u1", "alice");
        msg.stamp(&alice);
        assert_eq!(msg.sender_id, Some(UserId::from("u1")));
        assert_eq!(msg.sender_name.as_deref(), Some("alice"));
        assert!(msg.is_authored_by(&alice));
    }

    #[test]
    fn test_stamped_message_survives_reencoding() {
        let alice = Identity::new("u1", "alice");
        let mut msg = ChatMessage::new("hi");
        msg.stamp(&alice);

        let bytes = JsonCodec.encode(&msg).unwrap();
        let back = ChatMessage::decode(&JsonCodec, &bytes).unwrap();
        assert_eq!(back.sender_id, Some(UserId::from("u1")));
        assert_eq!(back.sender_name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_rendered_is_self_per_viewer() {
        let alice = Identity::new("u1", "alice");
        let bob = Identity::new("u2", "bob");
        let mut msg = ChatMessage::new("hi");
        msg.stamp(&alice);

        assert!(RenderedMessage::for_viewer(&msg, &alice).is_self);
        assert!(!RenderedMessage::for_viewer(&msg, &bob).is_self);
    }

    #[test]
    fn test_rendered_system_message_has_no_sender() {
        let bob = Identity::new("u2", "bob");
        let rendered = RenderedMessage::for_viewer(&ChatMessage::new("server restarting"), &bob);
        assert!(!rendered.is_self);

        let json = String::from_utf8(JsonCodec.encode(&rendered).unwrap()).unwrap();
        assert!(!json.contains("sender_id"));
        assert!(json.contains("\"is_self\":false"));
    }
}
