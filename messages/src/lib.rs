//! Wire message model and JSON codec for the joint-state channel.
//!
//! Every message on the channel is a JSON object tagged with a `type`
//! discriminator; the rest of the object is an arbitrary payload. This crate
//! keeps payloads flexible (`serde_json::Map`) and only lifts the payloads the
//! viewer understands (currently `joint_states`) into typed records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bucket used for inbound messages that carry no `type` field.
pub const DEFAULT_MESSAGE_TYPE: &str = "message";

/// Periodic joint position update published by the backend.
pub const JOINT_STATES: &str = "joint_states";

/// Payload key holding the joint name -> position mapping.
pub const JOINT_POSITIONS_FIELD: &str = "joint_positions";

/// Older alias for [`JOINT_POSITIONS_FIELD`].
pub const JOINTS_FIELD: &str = "joints";

/// Error returned by [`decode_message`] and the typed payload readers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("failed to parse message JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON root is not an object.
    #[error("message root must be a JSON object")]
    NotAnObject,
    /// The `type` discriminator is present but not a string.
    #[error("message `type` must be a string, got {0}")]
    InvalidType(Value),
    /// A required payload field is absent or has the wrong shape.
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
    /// The message is not of the expected type.
    #[error("expected `{expected}` message, got `{actual}`")]
    UnexpectedType { expected: &'static str, actual: String },
}

/// A single message on the channel: a `type` tag plus its payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    /// The `type` discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Every other top-level field of the message.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Message {
    /// Create an empty message of the given type.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), body: Map::new() }
    }

    /// Builder-style payload insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Look up a payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

/// Decode one inbound text frame.
///
/// A missing or `null` `type` falls back to [`DEFAULT_MESSAGE_TYPE`].
///
/// # Errors
///
/// Returns [`CodecError::Json`] for unparsable text, [`CodecError::NotAnObject`]
/// when the root is not an object and [`CodecError::InvalidType`] when `type`
/// is not a string.
pub fn decode_message(text: &str) -> Result<Message, CodecError> {
    let Value::Object(mut body) = serde_json::from_str::<Value>(text)? else {
        return Err(CodecError::NotAnObject);
    };

    let kind = match body.remove("type") {
        None | Some(Value::Null) => DEFAULT_MESSAGE_TYPE.to_owned(),
        Some(Value::String(kind)) => kind,
        Some(other) => return Err(CodecError::InvalidType(other)),
    };

    Ok(Message { kind, body })
}

/// Encode a message as a JSON text frame.
#[must_use]
pub fn encode_message(message: &Message) -> String {
    // Serializing a string key plus a `Map<String, Value>` cannot fail.
    serde_json::to_string(message).unwrap_or_default()
}

/// Typed view of a `joint_states` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStates {
    /// Joint name -> position (radians or meters, opaque here).
    #[serde(alias = "joints")]
    pub joint_positions: BTreeMap<String, f64>,
    /// Publisher timestamp in seconds, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Joint names whose value was not numeric and therefore dropped.
    #[serde(skip)]
    pub skipped: Vec<String>,
}

impl JointStates {
    /// Read joint positions out of a decoded message.
    ///
    /// Entries with non-numeric values are collected in `skipped` rather
    /// than failing the whole message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedType`] for non-`joint_states` messages
    /// and [`CodecError::MissingField`] when neither `joint_positions` nor
    /// `joints` holds an object.
    pub fn from_message(message: &Message) -> Result<Self, CodecError> {
        if message.kind != JOINT_STATES {
            return Err(CodecError::UnexpectedType { expected: JOINT_STATES, actual: message.kind.clone() });
        }

        let positions = message
            .get(JOINT_POSITIONS_FIELD)
            .or_else(|| message.get(JOINTS_FIELD))
            .and_then(Value::as_object)
            .ok_or(CodecError::MissingField(JOINT_POSITIONS_FIELD))?;

        let mut states = Self {
            timestamp: message.get("timestamp").and_then(Value::as_f64),
            ..Self::default()
        };
        for (name, value) in positions {
            match value.as_f64() {
                Some(position) => {
                    states.joint_positions.insert(name.clone(), position);
                }
                None => states.skipped.push(name.clone()),
            }
        }
        Ok(states)
    }

    /// Build the wire message for these joint positions.
    #[must_use]
    pub fn to_message(&self) -> Message {
        let positions = self
            .joint_positions
            .iter()
            .map(|(name, position)| (name.clone(), Value::from(*position)))
            .collect::<Map<_, _>>();
        let mut message = Message::new(JOINT_STATES).with(JOINT_POSITIONS_FIELD, Value::Object(positions));
        if let Some(ts) = self.timestamp {
            message = message.with("timestamp", ts);
        }
        message
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
