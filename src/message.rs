//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with camelCase naming.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Broadcast text to every connected peer
    Message { text: String },
    /// Ask for the roster to be re-broadcast
    RequestUserList,
    /// Liveness check, answered with `pong`
    Ping,
    /// Any other `type` value; ignored by the server
    #[serde(other)]
    Unknown,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with camelCase naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Display name assigned to the receiving session
    Username { username: String },
    /// Current roster, in assignment order
    UserList { users: Vec<String> },
    /// Broadcast text tagged with its sender
    Message { user: String, text: String },
    /// Reply to `ping`
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "message", "text": "hello"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Message {
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_client_control_messages_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"requestUserList"}"#).unwrap();
        assert_eq!(msg, ClientMessage::RequestUserList);

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"typing","x":1}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"text":"no type"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"message"}"#).is_err());
    }

    #[test]
    fn test_server_message_serialize() {
        let msg = ServerMessage::Message {
            user: "Luffy".to_string(),
            text: "hi".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"message","user":"Luffy","text":"hi"}"#);
    }

    #[test]
    fn test_user_list_and_pong_serialize() {
        let msg = ServerMessage::UserList {
            users: vec!["Luffy".to_string(), "Zoro".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"userList","users":["Luffy","Zoro"]}"#);

        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
