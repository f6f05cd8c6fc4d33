//! Codec for encoding and decoding Surge frames.
//!
//! The wire format is one JSON object per frame, UTF-8 text. Decoding
//! is defensive: malformed payloads and frames missing the `type`
//! discriminant produce a [`ProtocolError`] the transport layer logs
//! and drops; they never propagate as panics.

use thiserror::Error;

use crate::events::ClientEvent;
use crate::messages::ServerMessage;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize an outgoing event.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound frame was not valid JSON or did not match the
    /// server message union.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode an outgoing event to a wire frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ClientEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode an inbound wire frame.
///
/// Frames carrying a discriminant this client does not recognize
/// decode successfully to [`ServerMessage::Unknown`]; only malformed
/// JSON or shape mismatches produce an error.
///
/// # Errors
///
/// Returns an error if the frame is not parseable.
pub fn decode(text: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::User;

    fn alice() -> User {
        User::new("user-1", "alice")
    }

    #[test]
    fn test_encode_decode_all_client_events() {
        let events = vec![
            ClientEvent::subscribe("lobby", alice(), true, 50),
            ClientEvent::unsubscribe("lobby", alice()),
            ClientEvent::publish("lobby", alice(), "hello"),
            ClientEvent::presence("lobby", alice()),
            ClientEvent::typing("lobby", alice(), true),
            ClientEvent::read_receipt("lobby", "msg-1", alice()),
            ClientEvent::direct_msg("user-2", alice(), "psst"),
            ClientEvent::edit_message("lobby", "msg-1", alice(), "fixed"),
            ClientEvent::delete_message("lobby", "msg-1", alice()),
        ];

        for event in events {
            let wire = encode(&event).unwrap();
            let back: ClientEvent = serde_json::from_str(&wire).unwrap();
            assert_eq!(event, back);
        }
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode("{not json"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_discriminant() {
        assert!(matches!(
            decode(r#"{"room": "lobby"}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_unknown_discriminant_is_lossless_noop() {
        let msg = decode(r#"{"type": "totally_new_thing"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn test_decode_typing_frame() {
        let msg = decode(
            r#"{"type": "typing", "room": "lobby", "user": {"id": "u2", "name": "bob"}, "isTyping": false}"#,
        )
        .unwrap();

        match msg {
            ServerMessage::Typing {
                room,
                user,
                is_typing,
            } => {
                assert_eq!(room, "lobby");
                assert_eq!(user.id, "u2");
                assert!(!is_typing);
            }
            other => panic!("expected typing, got {other:?}"),
        }
    }
}
