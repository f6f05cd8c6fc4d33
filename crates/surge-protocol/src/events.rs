//! Client-side protocol events.
//!
//! Every outgoing frame is a [`ClientEvent`] serialized as a single
//! JSON object with a `type` discriminant. Field names follow the
//! server's wire contract (camelCase where the server expects it).

use serde::{Deserialize, Serialize};

/// A chat user as it appears on the wire.
///
/// `id` is the identity key for presence, typing, and ownership
/// comparisons. `name` is display-only and may collide between users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque client-generated identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl User {
    /// Create a new user.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Message payload carried by publish, edit, and direct-message frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Message body.
    pub message: String,
    /// Content type ("text", "image", ...). Only "text" is produced
    /// by this client.
    #[serde(rename = "type", default = "default_payload_kind")]
    pub kind: String,
}

fn default_payload_kind() -> String {
    "text".to_string()
}

impl Payload {
    /// Create a plain-text payload.
    #[must_use]
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: default_payload_kind(),
        }
    }
}

/// Options attached to a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Request a history replay on subscription.
    pub history: bool,
    /// Maximum number of replayed messages.
    pub limit: u32,
}

/// An outgoing protocol event.
///
/// Constructed per call, encoded, and transmitted; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a room, optionally requesting history replay.
    Subscribe {
        /// Room identifier.
        room: String,
        /// The subscribing user.
        user: User,
        /// History replay options.
        options: SubscribeOptions,
    },

    /// Unsubscribe from a room.
    Unsubscribe {
        /// Room identifier.
        room: String,
        /// The unsubscribing user.
        user: User,
    },

    /// Publish a message to a room.
    Publish {
        /// Target room.
        room: String,
        /// The sending user.
        user: User,
        /// Message payload.
        payload: Payload,
    },

    /// Enable presence tracking for a room.
    Presence {
        /// Room identifier.
        room: String,
        /// The user to track.
        user: User,
    },

    /// Typing indicator start/stop.
    Typing {
        /// Room identifier.
        room: String,
        /// The typing user.
        user: User,
        /// `true` while composing, `false` when idle.
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    /// Acknowledge that a message has been read.
    ReadReceipt {
        /// Room identifier.
        room: String,
        /// The acknowledged message.
        #[serde(rename = "messageId")]
        message_id: String,
        /// The reading user.
        user: User,
    },

    /// Send a direct message to another user.
    DirectMsg {
        /// Recipient user id.
        #[serde(rename = "toUserId")]
        to_user_id: String,
        /// The sending user.
        user: User,
        /// Message payload.
        payload: Payload,
    },

    /// Edit a previously published message.
    EditMessage {
        /// Room identifier.
        room: String,
        /// The message to edit.
        #[serde(rename = "messageId")]
        message_id: String,
        /// The editing user.
        user: User,
        /// Replacement payload.
        payload: Payload,
    },

    /// Delete a previously published message.
    DeleteMessage {
        /// Room identifier.
        room: String,
        /// The message to delete.
        #[serde(rename = "messageId")]
        message_id: String,
        /// The deleting user.
        user: User,
    },
}

impl ClientEvent {
    /// Create a Subscribe event with history replay options.
    #[must_use]
    pub fn subscribe(room: impl Into<String>, user: User, history: bool, limit: u32) -> Self {
        ClientEvent::Subscribe {
            room: room.into(),
            user,
            options: SubscribeOptions { history, limit },
        }
    }

    /// Create an Unsubscribe event.
    #[must_use]
    pub fn unsubscribe(room: impl Into<String>, user: User) -> Self {
        ClientEvent::Unsubscribe {
            room: room.into(),
            user,
        }
    }

    /// Create a Publish event with a plain-text payload.
    #[must_use]
    pub fn publish(room: impl Into<String>, user: User, message: impl Into<String>) -> Self {
        ClientEvent::Publish {
            room: room.into(),
            user,
            payload: Payload::text(message),
        }
    }

    /// Create a Presence event.
    #[must_use]
    pub fn presence(room: impl Into<String>, user: User) -> Self {
        ClientEvent::Presence {
            room: room.into(),
            user,
        }
    }

    /// Create a Typing event.
    #[must_use]
    pub fn typing(room: impl Into<String>, user: User, is_typing: bool) -> Self {
        ClientEvent::Typing {
            room: room.into(),
            user,
            is_typing,
        }
    }

    /// Create a ReadReceipt event.
    #[must_use]
    pub fn read_receipt(
        room: impl Into<String>,
        message_id: impl Into<String>,
        user: User,
    ) -> Self {
        ClientEvent::ReadReceipt {
            room: room.into(),
            message_id: message_id.into(),
            user,
        }
    }

    /// Create a DirectMsg event with a plain-text payload.
    #[must_use]
    pub fn direct_msg(
        to_user_id: impl Into<String>,
        user: User,
        message: impl Into<String>,
    ) -> Self {
        ClientEvent::DirectMsg {
            to_user_id: to_user_id.into(),
            user,
            payload: Payload::text(message),
        }
    }

    /// Create an EditMessage event with a plain-text payload.
    #[must_use]
    pub fn edit_message(
        room: impl Into<String>,
        message_id: impl Into<String>,
        user: User,
        new_text: impl Into<String>,
    ) -> Self {
        ClientEvent::EditMessage {
            room: room.into(),
            message_id: message_id.into(),
            user,
            payload: Payload::text(new_text),
        }
    }

    /// Create a DeleteMessage event.
    #[must_use]
    pub fn delete_message(
        room: impl Into<String>,
        message_id: impl Into<String>,
        user: User,
    ) -> Self {
        ClientEvent::DeleteMessage {
            room: room.into(),
            message_id: message_id.into(),
            user,
        }
    }

    /// The room this event targets, if any.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        match self {
            ClientEvent::Subscribe { room, .. }
            | ClientEvent::Unsubscribe { room, .. }
            | ClientEvent::Publish { room, .. }
            | ClientEvent::Presence { room, .. }
            | ClientEvent::Typing { room, .. }
            | ClientEvent::ReadReceipt { room, .. }
            | ClientEvent::EditMessage { room, .. }
            | ClientEvent::DeleteMessage { room, .. } => Some(room),
            ClientEvent::DirectMsg { .. } => None,
        }
    }
}
