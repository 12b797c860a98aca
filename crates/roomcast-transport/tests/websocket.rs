//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket listener and a tokio-tungstenite client
//! to check that bytes flow both ways and that the two kinds of close are
//! told apart.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use roomcast_transport::{
        CloseReason, Connection, MessageKind, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port, connects one client, and returns both ends.
    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let (client_ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = connected_pair().await;
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends text, client receives a text frame ---
        server_conn
            .send(b"hello from server", MessageKind::Text)
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn
            .close(CloseReason::going_away("server closing"))
            .await
            .expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_binary_kind() {
        let (server_conn, mut client_ws) = connected_pair().await;

        server_conn
            .send(&[1, 2, 3], MessageKind::Binary)
            .await
            .unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_normal_close() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "normal close is expected");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_going_away() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "tab closed".into(),
            })))
            .await
            .unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "going-away close is expected");
    }

    #[tokio::test]
    async fn test_websocket_recv_errors_on_error_close() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "policy".into(),
            })))
            .await
            .unwrap();

        let result = server_conn.recv().await;
        assert!(
            matches!(result, Err(TransportError::ConnectionClosed(_))),
            "policy close is unexpected, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_websocket_pending_recv_does_not_block_send() {
        let (server_conn, mut client_ws) = connected_pair().await;
        let server_conn = std::sync::Arc::new(server_conn);

        // Park a reader first.
        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // The write must still go through.
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send(b"still writable", MessageKind::Text),
        )
        .await
        .expect("send should not wait on the reader")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"still writable");

        client_ws.send(Message::Text("unblock".into())).await.unwrap();
        let read = reader.await.unwrap().unwrap();
        assert_eq!(read, Some(b"unblock".to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_local_close_ends_reads_without_peer_reply() {
        let (server_conn, mut client_ws) = connected_pair().await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        server_conn
            .close(CloseReason::going_away("evicted"))
            .await
            .expect("close should succeed");
        assert!(server_conn.is_closed());

        // The pending read ends even though the client never answers.
        let read = tokio::time::timeout(std::time::Duration::from_secs(2), reader)
            .await
            .expect("pending recv should end on local close")
            .unwrap();
        assert_eq!(read.unwrap(), None);

        // Frames the client sends afterwards are never surfaced.
        client_ws
            .send(Message::Text("after close".into()))
            .await
            .unwrap();
        assert_eq!(server_conn.recv().await.unwrap(), None);

        assert!(server_conn.close(CloseReason::normal("")).await.is_err());
    }
}
