//! Wire protocol for roomcast.
//!
//! This crate defines what travels between a chat client and the server:
//!
//! - **Identity types** ([`RoomId`], [`UserId`], [`Identity`]): who is
//!   talking, and where.
//! - **Chat messages** ([`ChatMessage`]): the permissive, typed document
//!   clients send: a required `chat_message` text, optional sender fields
//!   stamped by the server, and any extra fields carried along untouched.
//! - **Rendering** ([`Renderer`], [`JsonRenderer`], [`RenderedMessage`]):
//!   how a chat message is presented to one particular viewer.
//! - **Handshake frames** ([`SystemMessage`]): the first exchange on a
//!   server-accepted connection.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   converted to/from bytes.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! layer (fan-out). It doesn't know about connections or rooms; it only
//! knows how to shape and (de)serialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (ChatMessage) → Room (Bytes fan-out)
//! ```

mod codec;
mod error;
mod message;
mod render;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{ChatMessage, RenderedMessage};
pub use render::{JsonRenderer, Renderer};
pub use types::{Identity, RoomId, SystemMessage, UserId};
