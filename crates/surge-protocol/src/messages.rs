//! Server-side protocol messages.
//!
//! Every inbound frame decodes into a [`ServerMessage`]. The union is
//! closed: frames with a `type` discriminant this client does not
//! know decode to [`ServerMessage::Unknown`], which downstream
//! consumers treat as a forward-compatible no-op.

use crate::events::{Payload, User};
use serde::{Deserialize, Serialize};

/// Metadata attached to message and history frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Room the message belongs to.
    pub room: String,
    /// Server-side creation timestamp (ISO-8601).
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// Timestamp of the last edit, if any.
    #[serde(rename = "editedAt", default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<String>,
    /// Whether the message has been edited.
    #[serde(rename = "isEdited", default)]
    pub is_edited: bool,
}

/// Metadata attached to edit notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditMetadata {
    /// Timestamp of the edit (ISO-8601).
    #[serde(rename = "editedAt", default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<String>,
}

/// An inbound protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A live message published to a room.
    Message {
        /// Server-assigned message id, when available.
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        /// The authoring user.
        user: User,
        /// Message payload.
        payload: Payload,
        /// Routing and timestamp metadata.
        metadata: MessageMetadata,
    },

    /// A replayed message delivered on (re)subscription.
    ///
    /// Same shape as `message`; only the discriminant differs.
    History {
        /// Server-assigned message id, when available.
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        /// The authoring user.
        user: User,
        /// Message payload.
        payload: Payload,
        /// Routing and timestamp metadata.
        metadata: MessageMetadata,
    },

    /// Authoritative snapshot of a room's online users.
    PresenceList {
        /// Room identifier.
        room: String,
        /// Full presence set; replaces any local view.
        #[serde(rename = "presenceList", default)]
        presence_list: Vec<User>,
    },

    /// A user joined a room.
    UserJoined {
        /// Room identifier.
        room: String,
        /// The joining user.
        user: User,
    },

    /// A user left a room.
    UserLeft {
        /// Room identifier.
        room: String,
        /// The leaving user.
        user: User,
    },

    /// A user started or stopped typing.
    Typing {
        /// Room identifier.
        room: String,
        /// The typing user.
        user: User,
        /// `true` while composing.
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    /// A user read a message.
    ReadReceipt {
        /// Room identifier.
        room: String,
        /// The read message.
        #[serde(rename = "messageId")]
        message_id: String,
        /// The reading user.
        user: User,
    },

    /// A direct message addressed to this client.
    DirectMessage {
        /// The sending user.
        user: User,
        /// Message payload.
        payload: Payload,
    },

    /// A message was edited.
    MessageEdited {
        /// Room identifier.
        room: String,
        /// The edited message.
        #[serde(rename = "messageId")]
        message_id: String,
        /// Replacement payload.
        payload: Payload,
        /// Edit timestamp metadata.
        #[serde(default)]
        metadata: EditMetadata,
    },

    /// A message was deleted.
    MessageDeleted {
        /// Room identifier.
        room: String,
        /// The deleted message.
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// A protocol-level error reported by the server.
    Error {
        /// Human-readable error description.
        error: String,
    },

    /// A frame with an unrecognized discriminant.
    ///
    /// Kept for forward compatibility; never acted upon.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// A short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Message { .. } => "message",
            ServerMessage::History { .. } => "history",
            ServerMessage::PresenceList { .. } => "presence_list",
            ServerMessage::UserJoined { .. } => "user_joined",
            ServerMessage::UserLeft { .. } => "user_left",
            ServerMessage::Typing { .. } => "typing",
            ServerMessage::ReadReceipt { .. } => "read_receipt",
            ServerMessage::DirectMessage { .. } => "direct_message",
            ServerMessage::MessageEdited { .. } => "message_edited",
            ServerMessage::MessageDeleted { .. } => "message_deleted",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Unknown => "unknown",
        }
    }
}
