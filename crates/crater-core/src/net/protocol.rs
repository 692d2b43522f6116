use serde::Serialize;
use serde::de::DeserializeOwned;

use super::messages::{ClientMessage, ServerMessage};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 12;

/// Shortest accepted display name, in characters.
pub const MIN_NAME_LEN: usize = 3;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode any message as a JSON text frame, enforcing the size cap.
pub fn encode_message<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a JSON text frame, enforcing the size cap.
pub fn decode_message<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode_message(msg)
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    decode_message(text)
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode_message(msg)
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    decode_message(text)
}

/// Trim and validate a display name. Returns `None` if it is too short.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let name: String = raw.chars().take(MAX_NAME_LEN).collect();
    let name = name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use serde_json::json;

    #[test]
    fn client_messages_use_type_tag() {
        let text = encode_client_message(&ClientMessage::JoinRoom {
            code: "AB2Z".to_string(),
            as_spectator: false,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "joinRoom");
        assert_eq!(value["code"], "AB2Z");
        assert_eq!(value["asSpectator"], false);
    }

    #[test]
    fn join_room_spectator_flag_defaults_off() {
        let msg = decode_client_message(r#"{"type":"joinRoom","code":"AB2Z"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                code: "AB2Z".to_string(),
                as_spectator: false
            }
        );
    }

    #[test]
    fn game_action_payload_is_opaque() {
        let raw = r#"{"type":"gameAction","action":{"type":"shoot","angle":-0.8,"power":0.7,"extra":[1,2]}}"#;
        let msg = decode_client_message(raw).unwrap();
        let ClientMessage::GameAction { action } = msg else {
            panic!("expected gameAction");
        };
        assert_eq!(action["extra"], json!([1, 2]));
    }

    #[test]
    fn game_start_fields_are_camel_case() {
        let msg = ServerMessage::GameStart {
            players: vec![Player {
                id: 4,
                name: "Ace".to_string(),
            }],
            seed: 1234,
            first_player: 0,
        };
        let text = encode_server_message(&msg).unwrap();
        assert!(text.contains("\"firstPlayer\":0"));
        assert!(text.contains("\"type\":\"gameStart\""));
        assert_eq!(decode_server_message(&text).unwrap(), msg);
    }

    #[test]
    fn game_over_reason_omitted_when_absent() {
        let text = encode_server_message(&ServerMessage::GameOver {
            winner: "A".to_string(),
            reason: None,
        })
        .unwrap();
        assert!(!text.contains("reason"));
    }

    #[test]
    fn decode_relay_disconnect_notice() {
        let raw = r#"{"type":"gameOver","winner":"opponent_left","reason":"Opponent disconnected"}"#;
        let msg = decode_server_message(raw).unwrap();
        assert_eq!(
            msg,
            ServerMessage::GameOver {
                winner: crate::net::messages::OPPONENT_LEFT.to_string(),
                reason: Some("Opponent disconnected".to_string()),
            }
        );
    }

    #[test]
    fn empty_and_garbage_rejected() {
        assert!(matches!(
            decode_client_message("   "),
            Err(ProtocolError::EmptyMessage)
        ));
        assert!(matches!(
            decode_client_message("{not json"),
            Err(ProtocolError::DeserializeError(_))
        ));
        assert!(matches!(
            decode_client_message(r#"{"type":"launchNukes"}"#),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn oversized_frame_rejected() {
        let big = "x".repeat(MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            decode_client_message(&big),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn names_are_trimmed_and_capped() {
        assert_eq!(sanitize_name("  Bob  "), Some("Bob".to_string()));
        assert_eq!(sanitize_name("ab"), None);
        assert_eq!(
            sanitize_name("Abcdefghijklmnop"),
            Some("Abcdefghijkl".to_string())
        );
    }
}
