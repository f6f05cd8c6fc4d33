//! Reconciliation of inbound protocol events onto the room model.
//!
//! The [`Reconciler`] is the authoritative owner of room state and
//! its only writer. Each inbound [`ServerMessage`] is applied as one
//! state transition; events referencing unknown rooms or message ids
//! are silently ignored, favoring availability over strictness on a
//! best-effort transport.

use crate::identity::Identity;
use crate::message::{generate_message_id, ChatMessage, MessageKind};
use crate::room::{Room, RoomCatalog};
use chrono::Utc;
use surge_protocol::{MessageMetadata, Payload, ServerMessage, User};
use tracing::{debug, error, trace};

/// A reconciliation outcome that is surfaced to the UI layer instead
/// of being stored in a room.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A direct message addressed to this client.
    DirectMessage {
        /// The sending user.
        from: User,
        /// Message body.
        text: String,
    },
    /// A protocol-level error reported by the server.
    ServerError {
        /// Human-readable description.
        message: String,
    },
}

/// The authoritative store of room state.
pub struct Reconciler {
    rooms: Vec<Room>,
    identity: Identity,
}

impl Reconciler {
    /// Create a reconciler for a fixed room catalog.
    #[must_use]
    pub fn new(identity: Identity, catalog: &[RoomCatalog]) -> Self {
        Self {
            rooms: catalog.iter().map(Room::new).collect(),
            identity,
        }
    }

    /// All rooms, in catalog order.
    #[must_use]
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// A room by id.
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// The local identity this reconciler compares ownership against.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Reset every room to its empty state. Used at logout teardown.
    pub fn reset(&mut self) {
        for room in &mut self.rooms {
            room.messages.clear();
            room.presence.clear();
            room.typing_users.clear();
        }
    }

    /// Apply one inbound message as a state transition.
    ///
    /// Returns a [`Notice`] for events that are surfaced to the UI
    /// rather than stored (direct messages, server errors).
    pub fn apply(&mut self, message: &ServerMessage) -> Option<Notice> {
        match message {
            ServerMessage::Message {
                message_id,
                user,
                payload,
                metadata,
            } => {
                self.append_message(message_id.as_deref(), user, payload, metadata, false);
                None
            }
            ServerMessage::History {
                message_id,
                user,
                payload,
                metadata,
            } => {
                self.append_message(message_id.as_deref(), user, payload, metadata, true);
                None
            }
            ServerMessage::PresenceList {
                room,
                presence_list,
            } => {
                if let Some(room) = self.room_mut(room) {
                    room.set_presence(presence_list.clone());
                }
                None
            }
            ServerMessage::UserJoined { room, user } => {
                self.handle_user_joined(room, user);
                None
            }
            ServerMessage::UserLeft { room, user } => {
                self.handle_user_left(room, user);
                None
            }
            ServerMessage::Typing {
                room,
                user,
                is_typing,
            } => {
                if let Some(room) = self.room_mut(room) {
                    if *is_typing {
                        room.add_typing(user.clone());
                    } else {
                        room.remove_typing(&user.id);
                    }
                }
                None
            }
            ServerMessage::ReadReceipt {
                room,
                message_id,
                user,
            } => {
                if let Some(room) = self.room_mut(room) {
                    if let Some(msg) = room.message_mut(message_id) {
                        msg.mark_read_by(&user.id);
                    } else {
                        trace!(%message_id, "Read receipt for unknown message, ignoring");
                    }
                }
                None
            }
            ServerMessage::MessageEdited {
                room,
                message_id,
                payload,
                metadata,
            } => {
                if let Some(room) = self.room_mut(room) {
                    if let Some(msg) = room.message_mut(message_id) {
                        let edited_at = metadata
                            .edited_at
                            .clone()
                            .unwrap_or_else(|| Utc::now().to_rfc3339());
                        msg.apply_edit(payload.message.clone(), edited_at);
                        debug!(%room.id, %message_id, "Message edited");
                    } else {
                        trace!(%message_id, "Edit for unknown message, ignoring");
                    }
                }
                None
            }
            ServerMessage::MessageDeleted { room, message_id } => {
                if let Some(room) = self.room_mut(room) {
                    if let Some(msg) = room.message_mut(message_id) {
                        msg.apply_delete();
                        debug!(%room.id, %message_id, "Message deleted");
                    }
                }
                None
            }
            ServerMessage::DirectMessage { user, payload } => {
                debug!(from = %user.name, "Direct message received");
                Some(Notice::DirectMessage {
                    from: user.clone(),
                    text: payload.message.clone(),
                })
            }
            ServerMessage::Error { error: message } => {
                error!(%message, "Server reported an error");
                Some(Notice::ServerError {
                    message: message.clone(),
                })
            }
            ServerMessage::Unknown => {
                trace!("Ignoring unknown server message");
                None
            }
        }
    }

    fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        let room = self.rooms.iter_mut().find(|r| r.id == room_id);
        if room.is_none() {
            trace!(%room_id, "Event references unknown room, ignoring");
        }
        room
    }

    fn append_message(
        &mut self,
        message_id: Option<&str>,
        user: &User,
        payload: &Payload,
        metadata: &MessageMetadata,
        is_history: bool,
    ) {
        let kind = if self.identity.is_self(user) {
            MessageKind::Sent
        } else {
            MessageKind::Received
        };
        let id = message_id
            .map(str::to_string)
            .unwrap_or_else(generate_message_id);

        let Some(room) = self.room_mut(&metadata.room) else {
            return;
        };

        let mut message = ChatMessage::new(
            id,
            kind,
            payload.message.clone(),
            user.name.clone(),
            metadata.created_at.clone(),
        )
        .with_edit_state(metadata.is_edited, metadata.edited_at.clone());
        if is_history {
            message = message.as_history();
        }

        room.push_message(message);
    }

    fn handle_user_joined(&mut self, room_id: &str, user: &User) {
        let username = user.name.clone();
        let Some(room) = self.room_mut(room_id) else {
            return;
        };

        // First occurrence only: no duplicate entry, no second notice.
        if !room.add_presence(user.clone()) {
            return;
        }

        room.push_message(ChatMessage::system(format!("{username} joined the room")));
        debug!(%room_id, user = %username, "User joined");
    }

    fn handle_user_left(&mut self, room_id: &str, user: &User) {
        let username = user.name.clone();
        let Some(room) = self.room_mut(room_id) else {
            return;
        };

        room.remove_presence(&user.id);
        room.remove_typing(&user.id);
        room.push_message(ChatMessage::system(format!("{username} left the room")));
        debug!(%room_id, user = %username, "User left");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_protocol::EditMetadata;

    fn catalog() -> Vec<RoomCatalog> {
        vec![
            RoomCatalog::new("lobby", "Lobby"),
            RoomCatalog::new("games", "Games"),
        ]
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(Identity::new("user-me", "me"), &catalog())
    }

    fn metadata(room: &str) -> MessageMetadata {
        MessageMetadata {
            room: room.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            edited_at: None,
            is_edited: false,
        }
    }

    fn inbound_message(room: &str, id: &str, from: (&str, &str), text: &str) -> ServerMessage {
        ServerMessage::Message {
            message_id: Some(id.to_string()),
            user: User::new(from.0, from.1),
            payload: Payload::text(text),
            metadata: metadata(room),
        }
    }

    #[test]
    fn test_message_ownership_by_user_id() {
        let mut rec = reconciler();

        rec.apply(&inbound_message("lobby", "m1", ("user-me", "me"), "mine"));
        rec.apply(&inbound_message("lobby", "m2", ("user-2", "bob"), "theirs"));

        let messages = &rec.room("lobby").unwrap().messages;
        assert_eq!(messages[0].kind, MessageKind::Sent);
        assert_eq!(messages[1].kind, MessageKind::Received);
        assert_eq!(messages[1].author.as_deref(), Some("bob"));
    }

    #[test]
    fn test_history_before_live_messages_in_receipt_order() {
        let mut rec = reconciler();

        for i in 0..3 {
            rec.apply(&ServerMessage::History {
                message_id: Some(format!("h{i}")),
                user: User::new("user-2", "bob"),
                payload: Payload::text(format!("old {i}")),
                metadata: metadata("lobby"),
            });
        }

        let messages = &rec.room("lobby").unwrap().messages;
        assert_eq!(messages.len(), 3);
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["h0", "h1", "h2"]);
        assert!(messages.iter().all(|m| m.is_history));
    }

    #[test]
    fn test_message_without_server_id_gets_fallback() {
        let mut rec = reconciler();

        rec.apply(&ServerMessage::Message {
            message_id: None,
            user: User::new("user-2", "bob"),
            payload: Payload::text("hi"),
            metadata: metadata("lobby"),
        });

        let messages = &rec.room("lobby").unwrap().messages;
        assert!(messages[0].id.starts_with("local-"));
    }

    #[test]
    fn test_message_for_unknown_room_is_ignored() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("nowhere", "m1", ("user-2", "bob"), "hi"));

        assert!(rec.rooms().iter().all(|r| r.messages.is_empty()));
    }

    #[test]
    fn test_repeated_user_joined_is_idempotent() {
        let mut rec = reconciler();
        let joined = ServerMessage::UserJoined {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
        };

        rec.apply(&joined);
        rec.apply(&joined);
        rec.apply(&joined);

        let room = rec.room("lobby").unwrap();
        assert_eq!(room.presence.len(), 1);
        let system_count = room
            .messages
            .iter()
            .filter(|m| m.kind == MessageKind::System)
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(room.messages[0].text, "bob joined the room");
    }

    #[test]
    fn test_user_joined_does_not_touch_other_rooms() {
        let mut rec = reconciler();
        rec.apply(&ServerMessage::UserJoined {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
        });

        let games = rec.room("games").unwrap();
        assert!(games.presence.is_empty());
        assert!(games.messages.is_empty());
    }

    #[test]
    fn test_user_left_removes_presence_and_typing() {
        let mut rec = reconciler();
        rec.apply(&ServerMessage::UserJoined {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
        });
        rec.apply(&ServerMessage::Typing {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
            is_typing: true,
        });

        rec.apply(&ServerMessage::UserLeft {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
        });

        let room = rec.room("lobby").unwrap();
        assert!(!room.is_present("user-2"));
        assert!(!room.is_typing("user-2"));
        assert_eq!(room.messages.last().unwrap().text, "bob left the room");
    }

    #[test]
    fn test_presence_list_is_authoritative_replacement() {
        let mut rec = reconciler();
        rec.apply(&ServerMessage::UserJoined {
            room: "lobby".to_string(),
            user: User::new("user-2", "bob"),
        });

        rec.apply(&ServerMessage::PresenceList {
            room: "lobby".to_string(),
            presence_list: vec![User::new("user-3", "carol")],
        });

        let room = rec.room("lobby").unwrap();
        assert!(!room.is_present("user-2"));
        assert!(room.is_present("user-3"));
    }

    #[test]
    fn test_read_receipt_is_idempotent() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("lobby", "m1", ("user-me", "me"), "hi"));

        let receipt = ServerMessage::ReadReceipt {
            room: "lobby".to_string(),
            message_id: "m1".to_string(),
            user: User::new("user-2", "bob"),
        };
        rec.apply(&receipt);
        rec.apply(&receipt);

        let room = rec.room("lobby").unwrap();
        assert_eq!(room.messages[0].read_by, vec!["user-2".to_string()]);
    }

    #[test]
    fn test_edit_changes_only_target_message() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("lobby", "m1", ("user-me", "me"), "one"));
        rec.apply(&inbound_message("lobby", "m2", ("user-me", "me"), "two"));

        rec.apply(&ServerMessage::MessageEdited {
            room: "lobby".to_string(),
            message_id: "m1".to_string(),
            payload: Payload::text("one!"),
            metadata: EditMetadata {
                edited_at: Some("2024-01-02T00:00:00Z".to_string()),
            },
        });

        let room = rec.room("lobby").unwrap();
        assert_eq!(room.messages[0].text, "one!");
        assert!(room.messages[0].is_edited);
        assert_eq!(
            room.messages[0].edited_at.as_deref(),
            Some("2024-01-02T00:00:00Z")
        );
        // Untargeted message is untouched.
        assert_eq!(room.messages[1].text, "two");
        assert!(!room.messages[1].is_edited);
    }

    #[test]
    fn test_edit_of_unknown_message_is_silent_noop() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("lobby", "m1", ("user-me", "me"), "one"));
        let before = rec.room("lobby").unwrap().clone();

        rec.apply(&ServerMessage::MessageEdited {
            room: "lobby".to_string(),
            message_id: "missing".to_string(),
            payload: Payload::text("ghost"),
            metadata: EditMetadata::default(),
        });

        assert_eq!(rec.room("lobby").unwrap(), &before);
    }

    #[test]
    fn test_delete_marks_target_only() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("lobby", "m1", ("user-me", "me"), "oops"));
        rec.apply(&inbound_message("lobby", "m2", ("user-me", "me"), "keep"));

        rec.apply(&ServerMessage::MessageDeleted {
            room: "lobby".to_string(),
            message_id: "m1".to_string(),
        });

        let room = rec.room("lobby").unwrap();
        assert!(room.messages[0].is_deleted);
        assert!(!room.messages[1].is_deleted);

        // Unknown id: silent no-op.
        rec.apply(&ServerMessage::MessageDeleted {
            room: "lobby".to_string(),
            message_id: "missing".to_string(),
        });
    }

    #[test]
    fn test_direct_message_surfaces_notice_without_storing() {
        let mut rec = reconciler();

        let notice = rec.apply(&ServerMessage::DirectMessage {
            user: User::new("user-2", "bob"),
            payload: Payload::text("psst"),
        });

        assert_eq!(
            notice,
            Some(Notice::DirectMessage {
                from: User::new("user-2", "bob"),
                text: "psst".to_string(),
            })
        );
        assert!(rec.rooms().iter().all(|r| r.messages.is_empty()));
    }

    #[test]
    fn test_server_error_surfaces_notice_without_mutation() {
        let mut rec = reconciler();

        let notice = rec.apply(&ServerMessage::Error {
            error: "room is full".to_string(),
        });

        assert_eq!(
            notice,
            Some(Notice::ServerError {
                message: "room is full".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_message_is_noop() {
        let mut rec = reconciler();
        assert_eq!(rec.apply(&ServerMessage::Unknown), None);
    }

    #[test]
    fn test_reset_clears_all_rooms() {
        let mut rec = reconciler();
        rec.apply(&inbound_message("lobby", "m1", ("user-2", "bob"), "hi"));
        rec.apply(&ServerMessage::UserJoined {
            room: "games".to_string(),
            user: User::new("user-2", "bob"),
        });

        rec.reset();

        for room in rec.rooms() {
            assert!(room.messages.is_empty());
            assert!(room.presence.is_empty());
            assert!(room.typing_users.is_empty());
        }
    }
}
