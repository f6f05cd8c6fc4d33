//! The local message model.
//!
//! A [`ChatMessage`] is a reconciled view of a wire message: the
//! reconciler appends one per inbound `message`/`history` frame and
//! mutates it in place for later receipts, edits, and deletes that
//! reference the same id.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a fallback message id when the server did not assign one.
///
/// Locally generated ids are prefixed so they can never collide with
/// server-assigned ids.
#[must_use]
pub fn generate_message_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("local-{:x}", timestamp.wrapping_add(counter))
}

/// How a message relates to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Authored by the local user.
    Sent,
    /// Authored by another user.
    Received,
    /// Synthesized locally (join/leave notices).
    System,
    /// A direct message surfaced outside any room.
    DirectMessage,
}

/// A message in a room's timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Server-assigned id, or a locally generated fallback.
    pub id: String,
    /// Relation to the local user.
    pub kind: MessageKind,
    /// Message body. Blanked when the message is deleted.
    pub text: String,
    /// Author display name; absent for system messages.
    pub author: Option<String>,
    /// Creation timestamp (ISO-8601).
    pub timestamp: String,
    /// Whether this entry arrived as a history replay. Immutable
    /// once set.
    pub is_history: bool,
    /// Whether the message has been edited.
    pub is_edited: bool,
    /// Timestamp of the last edit (ISO-8601).
    pub edited_at: Option<String>,
    /// Whether the message has been deleted.
    pub is_deleted: bool,
    /// Ids of users who have read this message.
    pub read_by: Vec<String>,
}

impl ChatMessage {
    /// Create a message authored by a user.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: MessageKind,
        text: impl Into<String>,
        author: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            author: Some(author.into()),
            timestamp: timestamp.into(),
            is_history: false,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            read_by: Vec::new(),
        }
    }

    /// Create a locally synthesized system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            kind: MessageKind::System,
            text: text.into(),
            author: None,
            timestamp: Utc::now().to_rfc3339(),
            is_history: false,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            read_by: Vec::new(),
        }
    }

    /// Mark this entry as a history replay.
    #[must_use]
    pub fn as_history(mut self) -> Self {
        self.is_history = true;
        self
    }

    /// Carry over edit state replayed by the server.
    #[must_use]
    pub fn with_edit_state(mut self, is_edited: bool, edited_at: Option<String>) -> Self {
        self.is_edited = is_edited;
        self.edited_at = edited_at;
        self
    }

    /// Record that a user has read this message. Idempotent.
    ///
    /// Returns `true` if the reader was newly added.
    pub fn mark_read_by(&mut self, user_id: &str) -> bool {
        if self.read_by.iter().any(|id| id == user_id) {
            return false;
        }
        self.read_by.push(user_id.to_string());
        true
    }

    /// Apply an edit: replace the text and stamp the edit time.
    pub fn apply_edit(&mut self, text: impl Into<String>, edited_at: impl Into<String>) {
        self.text = text.into();
        self.is_edited = true;
        self.edited_at = Some(edited_at.into());
    }

    /// Apply a delete: blank the text and flag the entry.
    pub fn apply_delete(&mut self) {
        self.text.clear();
        self.is_deleted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_ids_are_unique_and_prefixed() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
        assert!(a.starts_with("local-"));
    }

    #[test]
    fn test_mark_read_by_is_idempotent() {
        let mut msg = ChatMessage::new("m1", MessageKind::Received, "hi", "bob", "t0");

        assert!(msg.mark_read_by("user-1"));
        assert!(!msg.mark_read_by("user-1"));
        assert_eq!(msg.read_by, vec!["user-1".to_string()]);
    }

    #[test]
    fn test_apply_edit_touches_only_edit_fields() {
        let mut msg = ChatMessage::new("m1", MessageKind::Received, "hi", "bob", "t0");
        let before = msg.clone();

        msg.apply_edit("hi!", "t1");

        assert_eq!(msg.text, "hi!");
        assert!(msg.is_edited);
        assert_eq!(msg.edited_at.as_deref(), Some("t1"));
        assert_eq!(msg.id, before.id);
        assert_eq!(msg.kind, before.kind);
        assert_eq!(msg.timestamp, before.timestamp);
        assert_eq!(msg.read_by, before.read_by);
        assert_eq!(msg.is_history, before.is_history);
    }

    #[test]
    fn test_apply_delete_blanks_text() {
        let mut msg = ChatMessage::new("m1", MessageKind::Sent, "oops", "alice", "t0");
        msg.apply_delete();

        assert!(msg.is_deleted);
        assert!(msg.text.is_empty());
    }

    #[test]
    fn test_system_messages_have_no_author() {
        let msg = ChatMessage::system("bob joined the room");
        assert_eq!(msg.kind, MessageKind::System);
        assert!(msg.author.is_none());
        assert!(!msg.is_history);
    }
}
