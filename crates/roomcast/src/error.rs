//! Unified error type for roomcast.

use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;
use roomcast_transport::TransportError;

use crate::{AuthError, StoreError};

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, stopped).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The handshake token was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The message store refused or failed a request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use roomcast_protocol::RoomId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Transport(_)));
        assert!(roomcast_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::Unavailable(RoomId::from("r1"));
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Room(_)));
        assert!(roomcast_err.to_string().contains("r1"));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::Rejected("expired".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Auth(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Backend("disk full".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Store(_)));
    }
}
