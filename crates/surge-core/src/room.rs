//! Room state.
//!
//! A [`Room`] holds the reconciled timeline, presence set, and typing
//! set for one chat room. The set of rooms is a fixed catalog supplied
//! at startup; rooms are never discovered dynamically.

use crate::message::ChatMessage;
use serde::Serialize;
use surge_protocol::User;

/// A single entry of the startup room catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCatalog {
    /// Room identifier used on the wire.
    pub id: String,
    /// Human-readable room name.
    pub name: String,
}

impl RoomCatalog {
    /// Create a catalog entry.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The reconciled state of one chat room.
///
/// Presence and typing are sets keyed by user id; vectors are used to
/// preserve arrival order, with explicit dedup on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    /// Room identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Timeline, in arrival order; never reordered.
    pub messages: Vec<ChatMessage>,
    /// Users currently online in the room.
    pub presence: Vec<User>,
    /// Users currently composing a message.
    pub typing_users: Vec<User>,
}

impl Room {
    /// Create an empty room from a catalog entry.
    #[must_use]
    pub fn new(catalog: &RoomCatalog) -> Self {
        Self {
            id: catalog.id.clone(),
            name: catalog.name.clone(),
            messages: Vec::new(),
            presence: Vec::new(),
            typing_users: Vec::new(),
        }
    }

    /// Whether a message with the given id exists in the timeline.
    #[must_use]
    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Mutable access to a message by id.
    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Append a message to the timeline.
    ///
    /// Duplicate ids are rejected to keep the at-most-one-per-id
    /// invariant; returns `false` when the message was dropped.
    pub fn push_message(&mut self, message: ChatMessage) -> bool {
        if self.contains_message(&message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Whether a user is in the presence set.
    #[must_use]
    pub fn is_present(&self, user_id: &str) -> bool {
        self.presence.iter().any(|u| u.id == user_id)
    }

    /// Add a user to the presence set.
    ///
    /// Returns `true` if the user was newly added.
    pub fn add_presence(&mut self, user: User) -> bool {
        if self.is_present(&user.id) {
            return false;
        }
        self.presence.push(user);
        true
    }

    /// Remove a user from the presence set. No-op if absent.
    pub fn remove_presence(&mut self, user_id: &str) {
        self.presence.retain(|u| u.id != user_id);
    }

    /// Replace the presence set wholesale with an authoritative
    /// snapshot from the server.
    pub fn set_presence(&mut self, users: Vec<User>) {
        self.presence = users;
    }

    /// Whether a user is in the typing set.
    #[must_use]
    pub fn is_typing(&self, user_id: &str) -> bool {
        self.typing_users.iter().any(|u| u.id == user_id)
    }

    /// Add a user to the typing set.
    ///
    /// Returns `true` if the user was newly added.
    pub fn add_typing(&mut self, user: User) -> bool {
        if self.is_typing(&user.id) {
            return false;
        }
        self.typing_users.push(user);
        true
    }

    /// Remove a user from the typing set. No-op if absent.
    pub fn remove_typing(&mut self, user_id: &str) {
        self.typing_users.retain(|u| u.id != user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn lobby() -> Room {
        Room::new(&RoomCatalog::new("lobby", "Lobby"))
    }

    #[test]
    fn test_push_message_rejects_duplicate_ids() {
        let mut room = lobby();
        let msg = ChatMessage::new("m1", MessageKind::Received, "hi", "bob", "t0");

        assert!(room.push_message(msg.clone()));
        assert!(!room.push_message(msg));
        assert_eq!(room.messages.len(), 1);
    }

    #[test]
    fn test_presence_dedup_preserves_order() {
        let mut room = lobby();

        assert!(room.add_presence(User::new("u1", "alice")));
        assert!(room.add_presence(User::new("u2", "bob")));
        assert!(!room.add_presence(User::new("u1", "alice")));

        let ids: Vec<&str> = room.presence.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[test]
    fn test_remove_presence_is_noop_when_absent() {
        let mut room = lobby();
        room.add_presence(User::new("u1", "alice"));

        room.remove_presence("u9");
        assert_eq!(room.presence.len(), 1);

        room.remove_presence("u1");
        assert!(room.presence.is_empty());
    }

    #[test]
    fn test_set_presence_replaces_wholesale() {
        let mut room = lobby();
        room.add_presence(User::new("u1", "alice"));
        room.add_presence(User::new("u2", "bob"));

        room.set_presence(vec![User::new("u3", "carol")]);

        assert!(!room.is_present("u1"));
        assert!(room.is_present("u3"));
        assert_eq!(room.presence.len(), 1);
    }

    #[test]
    fn test_typing_set_dedup() {
        let mut room = lobby();

        assert!(room.add_typing(User::new("u1", "alice")));
        assert!(!room.add_typing(User::new("u1", "alice")));
        assert_eq!(room.typing_users.len(), 1);

        room.remove_typing("u1");
        assert!(!room.is_typing("u1"));
        room.remove_typing("u1"); // no-op
    }
}
