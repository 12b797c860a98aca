//! # roomcast
//!
//! Room-scoped real-time chat fan-out.
//!
//! Clients connect over a [`Transport`](roomcast_transport::Transport),
//! say which room they want and who they are, and from then on every chat
//! message one member sends is rendered for and delivered to every member
//! of that room. A member that can't keep up is dropped from the room
//! rather than slowing everyone else down.
//!
//! The pieces:
//!
//! - [`RoomcastServer`]: accept loop and handshake
//! - [`Client`]: the per-connection inbound and outbound pumps
//! - [`MessageStore`]: best-effort persistence ([`InMemoryStore`] included)
//! - [`Authenticator`]: maps a handshake token to an
//!   [`Identity`](roomcast_protocol::Identity)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roomcast::prelude::*;
//!
//! struct DevAuth;
//!
//! impl Authenticator for DevAuth {
//!     async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
//!         Ok(Identity::new(token, token))
//!     }
//! }
//!
//! # async fn start() -> Result<(), RoomcastError> {
//! let server = RoomcastServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuth, Arc::new(InMemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod client;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::{AuthError, Authenticator};
pub use client::{Client, ClientHandle};
pub use config::{ClientConfig, ServerConfig};
pub use error::RoomcastError;
pub use server::{RoomcastServer, RoomcastServerBuilder};
pub use store::{InMemoryStore, MessageStore, StoreError, StoredMessage};

pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, Client, ClientConfig, ClientHandle, InMemoryStore,
        MessageStore, RoomcastError, RoomcastServer, RoomcastServerBuilder, ServerConfig,
        StoreError, StoredMessage,
    };
    pub use roomcast_protocol::{
        ChatMessage, Codec, Identity, JsonCodec, JsonRenderer, ProtocolError, RenderedMessage,
        Renderer, RoomId, SystemMessage, UserId,
    };
    pub use roomcast_room::{
        Member, MemberId, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomManager, RoomState,
    };
    pub use roomcast_transport::{
        CloseCode, CloseReason, Connection, ConnectionId, MessageKind, Transport, TransportError,
    };
}
