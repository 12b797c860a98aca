//! Per-connection handler: handshake, auth, then hand-off to the client.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake (within the handshake timeout)
//!   2. Authenticate token → Identity
//!   3. Resolve the room and send HandshakeAck
//!   4. Start the client pumps and wait for them to finish

use std::sync::Arc;

use roomcast_protocol::{Codec, Identity, JsonCodec, ProtocolError, Renderer, RoomId, SystemMessage};
use roomcast_transport::{CloseCode, CloseReason, Connection, MessageKind, TransportError};

use crate::server::ServerState;
use crate::{Authenticator, Client, MessageStore, RoomcastError};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A, S, R>(
    conn: C,
    state: Arc<ServerState<A, S, R>>,
) -> Result<(), RoomcastError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
    S: MessageStore,
    R: Renderer,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (room_id, identity) = match perform_handshake(&conn, &state).await {
        Ok(accepted) => accepted,
        Err(e) => {
            let _ = conn
                .close(CloseReason::new(CloseCode::Other(1008), "handshake failed"))
                .await;
            return Err(e);
        }
    };

    tracing::info!(%conn_id, %room_id, user = %identity, "client authenticated");

    let room = state.rooms.get_room(&room_id);
    let client = Client::new(
        conn,
        room,
        identity,
        Arc::clone(&state.store),
        Arc::clone(&state.renderer),
        state.client.clone(),
    );
    let handle = client.start().await?;
    let member_id = handle.member_id();
    handle.wait().await;

    tracing::info!(%conn_id, %room_id, %member_id, "client left room");
    Ok(())
}

/// Receives and validates the handshake, authenticates the token and
/// acknowledges. On failure the client is sent an `Error` frame first.
async fn perform_handshake<C, A, S, R>(
    conn: &C,
    state: &ServerState<A, S, R>,
) -> Result<(RoomId, Identity), RoomcastError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before handshake"));
        }
        Ok(Err(e)) => return Err(RoomcastError::Transport(e)),
        Err(_) => {
            send_error(conn, 408, "handshake timed out").await?;
            return Err(invalid("handshake timed out"));
        }
    };

    let (room_id, token) = match JsonCodec.decode::<SystemMessage>(&data) {
        Ok(SystemMessage::Handshake { room_id, token }) => (room_id, token),
        Ok(_) => {
            send_error(conn, 400, "expected Handshake").await?;
            return Err(invalid("first message must be Handshake"));
        }
        Err(e) => {
            send_error(conn, 400, "malformed handshake").await?;
            return Err(e.into());
        }
    };

    if room_id.is_empty() {
        send_error(conn, 400, "room id can't be empty").await?;
        return Err(invalid("empty room id"));
    }

    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            send_error(conn, 401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    let ack = SystemMessage::HandshakeAck {
        room_id: room_id.clone(),
        user_id: identity.user_id.clone(),
    };
    conn.send(&JsonCodec.encode(&ack)?, MessageKind::Text).await?;

    Ok((room_id, identity))
}

/// Sends a SystemMessage::Error frame to the client.
async fn send_error<C>(conn: &C, code: u16, message: &str) -> Result<(), RoomcastError>
where
    C: Connection<Error = TransportError>,
{
    let frame = SystemMessage::Error {
        code,
        message: message.to_string(),
    };
    conn.send(&JsonCodec.encode(&frame)?, MessageKind::Text).await?;
    Ok(())
}

fn invalid(reason: &str) -> RoomcastError {
    RoomcastError::Protocol(ProtocolError::InvalidMessage(reason.into()))
}
