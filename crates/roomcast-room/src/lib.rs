//! Rooms for roomcast.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! set of members in one chat room. Everything that touches the member set
//! goes through the room's mailbox, so the set needs no lock.
//!
//! # Key types
//!
//! - [`RoomManager`]: resolves room ids to running rooms, creating them
//!   on first use
//! - [`RoomHandle`]: send register/unregister/broadcast to a running room
//! - [`Member`]: what a room keeps per client: an id and the sending end
//!   of that client's bounded outbound queue
//! - [`RoomState`]: `Running` or `Stopped`
//! - [`RoomConfig`]: room settings
//!
//! # Backpressure
//!
//! A broadcast never waits on a member. If a member's outbound queue is
//! full the member is evicted on the spot and its queue is closed; the
//! rest of the room keeps receiving.

mod config;
mod error;
mod manager;
mod room;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{Member, MemberId, OutboundReceiver, OutboundSender, RoomHandle, RoomInfo};
