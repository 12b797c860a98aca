//! Error types for the room layer.

use roomcast_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id is registered.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room's control loop has stopped; its mailbox is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
