//! Transport abstraction layer for roomcast.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the byte-stream a chat client talks through.
//!
//! A connection distinguishes two kinds of ending:
//!
//! - an *expected* close (the peer said goodbye with a normal or
//!   going-away close), surfaced as `Ok(None)` from [`Connection::recv`];
//! - anything else, surfaced as an `Err`.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//!
//! The in-memory transport in [`memory`] is always available. It is what
//! the rest of the workspace uses to drive clients in tests.

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector, MemoryPeer, MemoryTransport, PeerEvent};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a written payload should be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// UTF-8 text frame. Chat traffic is always text.
    #[default]
    Text,
    /// Opaque binary frame.
    Binary,
}

/// Status attached to a close.
///
/// Mirrors the WebSocket close codes the rest of the system cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000: the conversation is over.
    Normal,
    /// 1001: the endpoint is going away (tab closed, server restarting).
    GoingAway,
    /// 1011: the endpoint hit an internal error.
    Error,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Returns `true` for closes that end a connection silently.
    pub fn is_expected(self) -> bool {
        matches!(self, Self::Normal | Self::GoingAway)
    }

    /// Returns the numeric close code.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::Error => 1011,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1011 => Self::Error,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Why a connection is being closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A normal close with the given reason.
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(CloseCode::Normal, reason)
    }

    /// A going-away close with the given reason.
    pub fn going_away(reason: impl Into<String>) -> Self {
        Self::new(CloseCode::GoingAway, reason)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
///
/// `recv` and `send` may be called concurrently from different tasks:
/// one task reads while another writes. Implementations must not let a
/// pending read block a write.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection the expected
    /// way (normal or going-away), and once this side has called
    /// [`close`](Connection::close), including reads already pending at
    /// that point. Every other ending is an error.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Sends data to the remote peer.
    fn send(
        &self,
        data: &[u8],
        kind: MessageKind,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Closes the connection. A second call fails.
    fn close(
        &self,
        reason: CloseReason,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_close_code_expected() {
        assert!(CloseCode::Normal.is_expected());
        assert!(CloseCode::GoingAway.is_expected());
        assert!(!CloseCode::Error.is_expected());
        assert!(!CloseCode::Other(1002).is_expected());
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from(1011), CloseCode::Error);
        assert_eq!(CloseCode::from(4000), CloseCode::Other(4000));
        assert_eq!(CloseCode::Other(4000).as_u16(), 4000);
    }

    #[test]
    fn test_close_reason_helpers() {
        let r = CloseReason::going_away("server closing");
        assert_eq!(r.code, CloseCode::GoingAway);
        assert_eq!(r.reason, "server closing");
        assert_eq!(CloseReason::normal("bye").code, CloseCode::Normal);
    }
}
