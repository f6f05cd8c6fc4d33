//! # surge-protocol
//!
//! Wire protocol definitions for the Surge realtime chat sync engine.
//!
//! The protocol is JSON over a persistent bidirectional connection,
//! one JSON object per frame. Each direction has its own closed
//! tagged union, discriminated by the `type` field:
//!
//! - [`ClientEvent`] - events the client sends (subscribe, publish,
//!   typing, read receipts, edits, direct messages)
//! - [`ServerMessage`] - events the server delivers (messages,
//!   history replay, presence, typing, receipts, errors)
//!
//! ## Example
//!
//! ```rust
//! use surge_protocol::{codec, ClientEvent, User};
//!
//! let user = User::new("user-1", "alice");
//! let event = ClientEvent::publish("lobby", user, "Hello, world!");
//!
//! let encoded = codec::encode(&event).unwrap();
//! assert!(encoded.contains("\"type\":\"publish\""));
//! ```

pub mod codec;
pub mod events;
pub mod messages;

pub use codec::{decode, encode, ProtocolError};
pub use events::{ClientEvent, Payload, SubscribeOptions, User};
pub use messages::{EditMetadata, MessageMetadata, ServerMessage};
