//! Control messages
//!
//! Control traffic travels as WebSocket text frames holding a JSON object
//! with a `type` tag. Point cloud payloads use binary frames and never pass
//! through here.
//!
//! ```text
//! server -> client   {"type":"welcome","message":"hi","client_id":7}   once, first
//! client -> server   {"type":"ping"}
//! server -> client   {"type":"pong"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::ClientId;

/// Greeting text carried in the handshake
pub const WELCOME_TEXT: &str = "hi";

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// One-time handshake carrying the assigned client id
    Welcome { message: String, client_id: ClientId },
    /// Liveness acknowledgement
    Pong,
}

impl ServerMessage {
    pub fn welcome(client_id: ClientId) -> Self {
        ServerMessage::Welcome {
            message: WELCOME_TEXT.to_string(),
            client_id,
        }
    }

    /// Serialize to the JSON text carried in a text frame
    pub fn to_json(&self) -> String {
        // Neither variant holds a map with non-string keys or a float
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Messages accepted from clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Liveness request
    Ping,
}

/// Why an inbound text frame was not a usable control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    /// Not JSON, or JSON without a string `type` field
    Malformed(String),
    /// Well-formed, but the `type` is not one we handle
    Unrecognized(String),
}

impl fmt::Display for ControlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlParseError::Malformed(reason) => write!(f, "malformed message: {}", reason),
            ControlParseError::Unrecognized(kind) => write!(f, "unrecognized message type: {}", kind),
        }
    }
}

impl std::error::Error for ControlParseError {}

impl ClientMessage {
    /// Parse one inbound text frame
    pub fn parse(text: &str) -> Result<Self, ControlParseError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ControlParseError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ControlParseError::Malformed("missing \"type\" field".into()))?
            .to_string();

        serde_json::from_value(value).map_err(|_| ControlParseError::Unrecognized(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_shape() {
        let json = ServerMessage::welcome(ClientId::new(7)).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"type": "welcome", "message": "hi", "client_id": 7})
        );
    }

    #[test]
    fn test_pong_shape() {
        assert_eq!(ServerMessage::Pong.to_json(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_server_message_parses_back() {
        let msg = ServerMessage::welcome(ClientId::new(3));
        let parsed: ServerMessage = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#), Ok(ClientMessage::Ping));
        // Extra fields are tolerated
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping","seq":12}"#),
            Ok(ClientMessage::Ping)
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"subscribe"}"#),
            Err(ControlParseError::Unrecognized("subscribe".into()))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            ClientMessage::parse("ping"),
            Err(ControlParseError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"kind":"ping"}"#),
            Err(ControlParseError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":5}"#),
            Err(ControlParseError::Malformed(_))
        ));
    }
}
