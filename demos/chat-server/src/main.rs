//! Example chat server.
//!
//! Accepts `user_id:display_name` tokens (development only), keeps history
//! in memory and renders every message as an HTML fragment a browser can
//! append to its message list.
//!
//! ```text
//! RUST_LOG=roomcast=debug cargo run -p chat-server -- 0.0.0.0:8080
//! ```

use std::env;
use std::sync::Arc;

use roomcast::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

struct DevAuth;

impl Authenticator for DevAuth {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let (user_id, name) = token
            .split_once(':')
            .ok_or_else(|| AuthError::Rejected("token must be user_id:display_name".into()))?;
        if user_id.is_empty() || name.is_empty() {
            return Err(AuthError::Rejected("user id and display name are required".into()));
        }
        Ok(Identity::new(user_id, name))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders a message as an out-of-band swap into `#messages`.
struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, msg: &ChatMessage, viewer: &Identity) -> Result<Vec<u8>, ProtocolError> {
        let side = if msg.is_authored_by(viewer) { "chat-end" } else { "chat-start" };
        let sender = msg.sender_name.as_deref().unwrap_or("system");
        let html = format!(
            r#"<div id="messages" hx-swap-oob="beforeend"><div class="chat {side}"><div class="chat-header">{}</div><div class="chat-bubble">{}</div></div></div>"#,
            escape(sender),
            escape(&msg.chat_message),
        );
        Ok(html.into_bytes())
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides, e.g. RUST_LOG=roomcast=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roomcast=info,chat_server=info")),
        )
        .init();

    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let store = Arc::new(InMemoryStore::new());
    let server = RoomcastServerBuilder::new()
        .bind(&addr)
        .build(DevAuth, Arc::clone(&store))
        .await?
        .with_renderer(HtmlRenderer);

    tracing::info!(addr = %server.local_addr()?, "chat server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> String {
        let server = RoomcastServerBuilder::new()
            .bind("127.0.0.1:0")
            .build(DevAuth, Arc::new(InMemoryStore::new()))
            .await
            .unwrap()
            .with_renderer(HtmlRenderer);
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn join(addr: &str, room: &str, token: &str) -> Ws {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        let hs = SystemMessage::Handshake {
            room_id: RoomId::from(room),
            token: token.into(),
        };
        ws.send(Message::text(serde_json::to_string(&hs).unwrap()))
            .await
            .unwrap();
        let _ = ws.next().await.unwrap().unwrap(); // HandshakeAck
        ws
    }

    async fn next_text(ws: &mut Ws) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        msg.into_text().unwrap().as_str().to_owned()
    }

    #[tokio::test]
    async fn test_dev_auth() {
        let identity = DevAuth.authenticate("u1:alice").await.unwrap();
        assert_eq!(identity, Identity::new("u1", "alice"));
        assert!(DevAuth.authenticate("alice").await.is_err());
        assert!(DevAuth.authenticate(":alice").await.is_err());
    }

    #[test]
    fn test_html_renderer_sides_and_escaping() {
        let alice = Identity::new("u1", "alice");
        let bob = Identity::new("u2", "bob");
        let mut msg = ChatMessage::new("<b>hi</b> & bye");
        msg.stamp(&alice);

        let mine = String::from_utf8(HtmlRenderer.render(&msg, &alice).unwrap()).unwrap();
        let theirs = String::from_utf8(HtmlRenderer.render(&msg, &bob).unwrap()).unwrap();

        assert!(mine.contains("chat-end"));
        assert!(theirs.contains("chat-start"));
        assert!(mine.contains("&lt;b&gt;hi&lt;/b&gt; &amp; bye"));
        assert!(!mine.contains("<b>"));
    }

    #[test]
    fn test_escape_quotes_and_ampersands() {
        assert_eq!(escape("it's"), "it&#39;s");
        assert_eq!(escape("a && b"), "a &amp;&amp; b");
        assert_eq!(escape(r#"say "hi""#), "say &quot;hi&quot;");
        assert_eq!(escape("&amp;"), "&amp;amp;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_html_renderer_system_message() {
        let bob = Identity::new("u2", "bob");
        let html = String::from_utf8(
            HtmlRenderer.render(&ChatMessage::new("restarting"), &bob).unwrap(),
        )
        .unwrap();
        assert!(html.contains(">system<"));
        assert!(html.contains("chat-start"));
    }

    #[tokio::test]
    async fn test_full_chat() {
        let addr = start().await;
        let mut alice = join(&addr, "lobby", "u1:alice").await;
        let mut bob = join(&addr, "lobby", "u2:bob").await;
        // Both handshakes are acked; give the second registration a moment.
        tokio::time::sleep(Duration::from_millis(50)).await;

        alice
            .send(Message::text(r#"{"chat_message":"hello bob"}"#))
            .await
            .unwrap();

        let mine = next_text(&mut alice).await;
        assert!(mine.contains("chat-end"));
        assert!(mine.contains("hello bob"));

        let theirs = next_text(&mut bob).await;
        assert!(theirs.contains("chat-start"));
        assert!(theirs.contains("alice"));
    }
}
