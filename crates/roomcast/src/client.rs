//! Per-connection client: one inbound pump and one outbound pump.
//!
//! The inbound pump reads from the connection and hands every payload to
//! the room. The outbound pump drains this client's queue, renders each
//! payload for this viewer and writes it to the connection. They share
//! the connection, the room handle and a stop flag: whichever pump exits
//! first stops the other.
//!
//! ```text
//!  connection ──recv──→ inbound pump ──broadcast──→ room
//!  connection ←─send─── outbound pump ←──queue───── room
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use roomcast_protocol::{ChatMessage, Codec, Identity, JsonCodec, Renderer};
use roomcast_room::{Member, MemberId, OutboundReceiver, RoomHandle};
use roomcast_transport::{CloseReason, Connection, MessageKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{ClientConfig, MessageStore, RoomcastError};

/// State both pumps read.
struct ClientContext<C> {
    conn: C,
    room: RoomHandle,
    identity: Identity,
    member_id: MemberId,
    stop: watch::Sender<bool>,
    write_timeout: Duration,
}

impl<C: Connection> ClientContext<C> {
    fn stop_pumps(&self) {
        self.stop.send_replace(true);
    }

    /// Closes the connection, then stops the other pump. Closing never
    /// waits longer than a write would.
    async fn shut_down(&self, reason: CloseReason) {
        match tokio::time::timeout(self.write_timeout, self.conn.close(reason)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(member_id = %self.member_id, error = %e, "close failed"),
            Err(_) => tracing::debug!(member_id = %self.member_id, "close timed out"),
        }
        self.stop_pumps();
    }
}

/// A connection that is about to join a room.
pub struct Client<C, S, R> {
    conn: C,
    room: RoomHandle,
    identity: Identity,
    store: Arc<S>,
    renderer: Arc<R>,
    config: ClientConfig,
}

impl<C, S, R> Client<C, S, R>
where
    C: Connection,
    S: MessageStore,
    R: Renderer,
{
    /// `identity` must already be authenticated.
    pub fn new(
        conn: C,
        room: RoomHandle,
        identity: Identity,
        store: Arc<S>,
        renderer: Arc<R>,
        config: ClientConfig,
    ) -> Self {
        Self {
            conn,
            room,
            identity,
            store,
            renderer,
            config,
        }
    }

    /// Registers with the room and spawns both pumps.
    ///
    /// # Errors
    /// `RoomError::Unavailable` if the room has already stopped. Nothing
    /// is spawned in that case.
    pub async fn start(self) -> Result<ClientHandle, RoomcastError> {
        let (member, outbound) = Member::channel(self.config.outbound_capacity.max(1));
        let member_id = member.id();
        self.room.register(member).await?;

        tracing::info!(
            conn_id = %self.conn.id(),
            %member_id,
            room_id = %self.room.room_id(),
            user = %self.identity,
            "client joined room"
        );

        let ctx = Arc::new(ClientContext {
            conn: self.conn,
            room: self.room,
            identity: self.identity,
            member_id,
            stop: watch::Sender::new(false),
            write_timeout: self.config.write_timeout,
        });

        let inbound = tokio::spawn(inbound_pump(Arc::clone(&ctx), self.store));
        let outbound = tokio::spawn(outbound_pump(ctx, outbound, self.renderer));

        Ok(ClientHandle {
            member_id,
            inbound,
            outbound,
        })
    }
}

/// Handle to a started client.
///
/// Dropping it does not stop the client; the pumps end on their own when
/// the connection closes or the room lets go of the member.
#[derive(Debug)]
pub struct ClientHandle {
    member_id: MemberId,
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl ClientHandle {
    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// Waits until both pumps have exited.
    pub async fn wait(self) {
        for (pump, handle) in [("inbound", self.inbound), ("outbound", self.outbound)] {
            if let Err(e) = handle.await {
                tracing::error!(member_id = %self.member_id, pump, error = %e, "client pump panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound pump
// ---------------------------------------------------------------------------

async fn inbound_pump<C, S>(ctx: Arc<ClientContext<C>>, store: Arc<S>)
where
    C: Connection,
    S: MessageStore,
{
    let member_id = ctx.member_id;
    let mut stop = ctx.stop.subscribe();

    loop {
        let received = tokio::select! {
            biased;

            _ = stopped(&mut stop) => {
                tracing::debug!(%member_id, "inbound pump cancelled");
                break;
            }
            received = ctx.conn.recv() => received,
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%member_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(%member_id, error = %e, "read failed");
                break;
            }
        };

        let payload = match annotate(&ctx.identity, &data) {
            Some((message, payload)) => {
                persist(&store, &ctx, message.chat_message);
                payload
            }
            None => Bytes::from(data),
        };

        if let Err(e) = ctx.room.broadcast(payload).await {
            tracing::debug!(%member_id, error = %e, "room stopped, dropping inbound");
            break;
        }
    }

    // Stop the writer before the room drops its queue.
    ctx.stop_pumps();
    let _ = ctx.room.unregister(member_id).await;
    ctx.shut_down(CloseReason::normal("")).await;
    tracing::debug!(%member_id, "inbound pump stopped");
}

/// Parses an inbound payload and stamps it with the sender's identity.
///
/// Returns `None` when the payload isn't a chat message; the caller
/// forwards those bytes untouched.
fn annotate(identity: &Identity, data: &[u8]) -> Option<(ChatMessage, Bytes)> {
    let mut message = match ChatMessage::decode(&JsonCodec, data) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "inbound payload is not a chat message, forwarding raw");
            return None;
        }
    };
    message.stamp(identity);
    match JsonCodec.encode(&message) {
        Ok(encoded) => Some((message, Bytes::from(encoded))),
        Err(e) => {
            tracing::warn!(error = %e, "failed to re-encode chat message, forwarding raw");
            None
        }
    }
}

/// Stores the message on its own task. Failures are logged and dropped.
fn persist<C, S: MessageStore>(store: &Arc<S>, ctx: &ClientContext<C>, content: String) {
    let store = Arc::clone(store);
    let room_id = ctx.room.room_id().clone();
    let user_id = ctx.identity.user_id.clone();

    tokio::spawn(async move {
        match store.create(room_id.clone(), user_id, content).await {
            Ok(stored) => {
                tracing::trace!(%room_id, message_id = stored.id, "message stored");
            }
            Err(e) => {
                tracing::warn!(%room_id, error = %e, "failed to store message");
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Outbound pump
// ---------------------------------------------------------------------------

async fn outbound_pump<C, R>(
    ctx: Arc<ClientContext<C>>,
    mut queue: OutboundReceiver,
    renderer: Arc<R>,
) where
    C: Connection,
    R: Renderer,
{
    let member_id = ctx.member_id;
    let write_timeout = ctx.write_timeout;
    let mut stop = ctx.stop.subscribe();
    let mut close = CloseReason::normal("");

    loop {
        let payload = tokio::select! {
            biased;

            _ = stopped(&mut stop) => {
                tracing::debug!(%member_id, pending = queue.len(), "outbound pump cancelled");
                break;
            }
            payload = queue.recv() => match payload {
                Some(payload) => payload,
                None => {
                    tracing::debug!(%member_id, "removed from room");
                    close = CloseReason::going_away("removed from room");
                    break;
                }
            },
        };

        let frame = render(renderer.as_ref(), &payload, &ctx.identity);
        match tokio::time::timeout(write_timeout, ctx.conn.send(&frame, MessageKind::Text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(%member_id, error = %e, "write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    %member_id,
                    timeout = ?write_timeout,
                    "write timed out, skipping message"
                );
            }
        }
    }

    ctx.shut_down(close).await;
    let _ = ctx.room.unregister(member_id).await;
    tracing::debug!(%member_id, "outbound pump stopped");
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Renders a queued payload for `viewer`. Payloads that aren't chat
/// messages go out as they came in.
fn render<R: Renderer>(renderer: &R, payload: &Bytes, viewer: &Identity) -> Bytes {
    let Ok(message) = ChatMessage::decode(&JsonCodec, payload) else {
        return payload.clone();
    };
    match renderer.render(&message, viewer) {
        Ok(rendered) => Bytes::from(rendered),
        Err(e) => {
            tracing::warn!(error = %e, "failed to render message, sending as stored");
            payload.clone()
        }
    }
}
