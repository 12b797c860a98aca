//! In-process transport built on Tokio channels.
//!
//! A [`MemoryConnection`] is the server side of a connection; the matching
//! [`MemoryPeer`] plays the remote client. Both directions are bounded, so
//! a peer that stops reading eventually makes server-side writes wait,
//! just like a stalled socket.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify, mpsc, watch};

use crate::{CloseReason, Connection, ConnectionId, MessageKind, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default buffer size for each direction of a memory connection.
pub const DEFAULT_CAPACITY: usize = 64;

/// What the peer side observes from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// The server wrote a message.
    Message { kind: MessageKind, data: Vec<u8> },
    /// The server closed the connection.
    Closed(CloseReason),
}

impl PeerEvent {
    /// Returns the payload of a `Message` event.
    pub fn into_data(self) -> Option<Vec<u8>> {
        match self {
            Self::Message { data, .. } => Some(data),
            Self::Closed(_) => None,
        }
    }
}

#[derive(Debug)]
enum Inbound {
    Data(Vec<u8>),
    Close(CloseReason),
}

/// Creates a connected (server side, peer side) pair.
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));

    let conn = MemoryConnection {
        id,
        inbound: Mutex::new(inbound_rx),
        outbound: outbound_tx,
        closed: watch::Sender::new(false),
    };
    let peer = MemoryPeer {
        inbound: inbound_tx,
        outbound: outbound_rx,
    };
    (conn, peer)
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::Receiver<Inbound>>,
    outbound: mpsc::Sender<PeerEvent>,
    closed: watch::Sender<bool>,
}

impl MemoryConnection {
    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

async fn closed_locally(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    /// Once this side has called `close`, pending and later reads end
    /// with `Ok(None)`, the way a socket finishes its closing handshake.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let mut inbound = self.inbound.lock().await;
        let event = tokio::select! {
            biased;
            _ = closed_locally(&mut closed) => return Ok(None),
            event = inbound.recv() => event,
        };
        match event {
            Some(Inbound::Data(data)) => Ok(Some(data)),
            Some(Inbound::Close(reason)) if reason.code.is_expected() => Ok(None),
            Some(Inbound::Close(reason)) => Err(TransportError::ConnectionClosed(format!(
                "peer closed with {}: {}",
                reason.code, reason.reason
            ))),
            None => Err(TransportError::ConnectionClosed("peer dropped".into())),
        }
    }

    async fn send(&self, data: &[u8], kind: MessageKind) -> Result<(), Self::Error> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed("already closed".into()));
        }
        self.outbound
            .send(PeerEvent::Message {
                kind,
                data: data.to_vec(),
            })
            .await
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn close(&self, reason: CloseReason) -> Result<(), Self::Error> {
        if self.closed.send_replace(true) {
            return Err(TransportError::ConnectionClosed("already closed".into()));
        }
        // Never wait on a peer that stopped reading.
        let _ = self.outbound.try_send(PeerEvent::Closed(reason));
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The remote end of a [`MemoryConnection`].
///
/// Dropping the peer without calling [`close`](Self::close) looks like an
/// abrupt disconnect to the server.
pub struct MemoryPeer {
    inbound: mpsc::Sender<Inbound>,
    outbound: mpsc::Receiver<PeerEvent>,
}

impl MemoryPeer {
    /// Sends a payload to the server.
    pub async fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.inbound
            .send(Inbound::Data(data.into()))
            .await
            .map_err(|_| TransportError::ConnectionClosed("server dropped".into()))
    }

    /// Sends a close with the given reason.
    pub async fn close(&self, reason: CloseReason) -> Result<(), TransportError> {
        self.inbound
            .send(Inbound::Close(reason))
            .await
            .map_err(|_| TransportError::ConnectionClosed("server dropped".into()))
    }

    /// Waits for the next event from the server.
    ///
    /// Returns `None` once the server side is gone and everything it wrote
    /// has been read.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.outbound.recv().await
    }

    /// Returns the next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<PeerEvent> {
        self.outbound.try_recv().ok()
    }
}

/// An in-memory [`Transport`]. Connections are made through the paired
/// [`MemoryConnector`].
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
    shut_down: AtomicBool,
    shutdown_notify: Notify,
}

impl MemoryTransport {
    /// Creates a transport and the connector that feeds it.
    pub fn new() -> (Self, MemoryConnector) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            incoming: rx,
            shut_down: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
        };
        (transport, MemoryConnector { outgoing: tx })
    }
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        tokio::select! {
            conn = self.incoming.recv() => conn.ok_or(TransportError::Shutdown),
            _ = self.shutdown_notify.notified() => Err(TransportError::Shutdown),
        }
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.shut_down.store(true, Ordering::Release);
        self.shutdown_notify.notify_waiters();
        Ok(())
    }
}

/// Opens connections to a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryConnector {
    outgoing: mpsc::UnboundedSender<MemoryConnection>,
}

impl MemoryConnector {
    /// Opens a connection with the default buffer size.
    pub fn connect(&self) -> Result<MemoryPeer, TransportError> {
        self.connect_with_capacity(DEFAULT_CAPACITY)
    }

    /// Opens a connection whose directions each buffer `capacity` messages.
    pub fn connect_with_capacity(&self, capacity: usize) -> Result<MemoryPeer, TransportError> {
        let (conn, peer) = pair(capacity);
        self.outgoing
            .send(conn)
            .map_err(|_| TransportError::Shutdown)?;
        Ok(peer)
    }
}
