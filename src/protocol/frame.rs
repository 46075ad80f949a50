//! WebSocket frame formats
//!
//! Inbound (client → server):
//!
//! ```json
//! {"type": "join", "circleId": "c1"}
//! ```
//!
//! Outbound (server → client):
//!
//! ```json
//! {"type": "message", "circleId": "c1",
//!  "message": {"id": "...", "circleId": "c1", "senderId": "...",
//!              "content": "...", "createdAt": "..."}}
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{CircleId, Message};

/// Why an inbound frame could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not a valid control frame: {0}")]
    Invalid(String),
    #[error("frame has no type")]
    MissingType,
    #[error("join frame has no circleId")]
    MissingCircleId,
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// Control frame sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Declare interest in a circle
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "circleId")]
        circle_id: CircleId,
    },
    /// Any frame whose type this server does not know
    #[serde(skip)]
    Unrecognized { kind: String },
}

impl ClientFrame {
    /// Build a join frame
    pub fn join(circle_id: impl Into<CircleId>) -> Self {
        ClientFrame::Join {
            circle_id: circle_id.into(),
        }
    }

    /// Parse a raw text frame
    ///
    /// Only JSON objects are control frames. A `null` field counts as missing.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| FrameError::Invalid(e.to_string()))?;
        let Some(fields) = value.as_object() else {
            return Err(FrameError::Invalid("expected a JSON object".into()));
        };

        let kind = match fields.get("type") {
            None | Some(Value::Null) => return Err(FrameError::MissingType),
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(FrameError::Invalid("type must be a string".into())),
        };

        match kind.as_str() {
            "join" => {
                let circle_id = match fields.get("circleId") {
                    None | Some(Value::Null) => return Err(FrameError::MissingCircleId),
                    Some(Value::String(id)) => CircleId::new(id.as_str()),
                    Some(_) => {
                        return Err(FrameError::Invalid("circleId must be a string".into()))
                    }
                };
                if circle_id.is_blank() {
                    return Err(FrameError::MissingCircleId);
                }
                Ok(ClientFrame::Join { circle_id })
            }
            _ => Ok(ClientFrame::Unrecognized { kind }),
        }
    }

    /// Encode as JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame pushed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// A newly persisted chat message
    #[serde(rename = "message")]
    Message {
        #[serde(rename = "circleId")]
        circle_id: CircleId,
        message: Message,
    },
}

impl ServerFrame {
    pub fn message(message: &Message) -> Self {
        ServerFrame::Message {
            circle_id: message.circle_id.clone(),
            message: message.clone(),
        }
    }

    /// Decode a text frame received from the server
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// An encoded outbound frame, ready to be written to any number of sockets
///
/// Encoded once per broadcast; clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFrame {
    payload: Bytes,
}

impl PushFrame {
    /// Encode the push frame for a persisted message
    pub fn for_message(message: &Message) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(&ServerFrame::message(message))?;
        Ok(Self {
            payload: Bytes::from(payload),
        })
    }

    /// Encoded JSON bytes (always valid UTF-8)
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
