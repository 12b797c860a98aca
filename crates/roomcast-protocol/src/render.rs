//! Turning a room message into the bytes one viewer receives.
//!
//! Markup is somebody else's job: a deployment that wants HTML fragments
//! implements [`Renderer`] itself. The crate ships [`JsonRenderer`].

use crate::{ChatMessage, Codec, Identity, JsonCodec, ProtocolError, RenderedMessage};

/// Renders a chat message for a specific viewer.
pub trait Renderer: Send + Sync + 'static {
    /// # Errors
    /// Returns `ProtocolError::Encode` if the rendered form can't be
    /// serialized.
    fn render(&self, msg: &ChatMessage, viewer: &Identity) -> Result<Vec<u8>, ProtocolError>;
}

/// Renders a [`RenderedMessage`] as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, msg: &ChatMessage, viewer: &Identity) -> Result<Vec<u8>, ProtocolError> {
        JsonCodec.encode(&RenderedMessage::for_viewer(msg, viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_renderer_marks_self() {
        let alice = Identity::new("u1", "alice");
        let bob = Identity::new("u2", "bob");
        let mut msg = ChatMessage::new("hi");
        msg.stamp(&alice);

        let for_alice: RenderedMessage =
            JsonCodec.decode(&JsonRenderer.render(&msg, &alice).unwrap()).unwrap();
        let for_bob: RenderedMessage =
            JsonCodec.decode(&JsonRenderer.render(&msg, &bob).unwrap()).unwrap();

        assert!(for_alice.is_self);
        assert!(!for_bob.is_self);
        assert_eq!(for_alice.chat_message, "hi");
        assert_eq!(for_bob.sender_name.as_deref(), Some("alice"));
    }
}
