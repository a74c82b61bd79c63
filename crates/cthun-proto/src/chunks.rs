//! Parsed message chunks and the envelope they carry

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Transport-level metadata wrapping every message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message id assigned by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Sender URI
    pub sender: String,
    /// Destination URIs
    pub targets: Vec<String>,
    /// Schema identifier of the data chunk
    pub message_type: String,
    /// Expiry timestamp (ISO 8601)
    pub expires: String,
    /// Whether the broker should report delivery back to the sender
    #[serde(default)]
    pub destination_report: bool,
}

impl Envelope {
    /// Deserialize an envelope chunk
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        Self::deserialize(value).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
    }
}

/// Chunks of one inbound message, as handed over by the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedChunks {
    /// Raw envelope chunk
    pub envelope: Value,
    /// Raw data chunk, absent when the message carried none
    #[serde(default)]
    pub data: Option<Value>,
    /// Debug chunks accumulated along the route
    #[serde(default)]
    pub debug: Vec<Value>,
    /// Number of broker hops recorded for the message
    #[serde(default)]
    pub hop_count: u32,
}

impl ParsedChunks {
    /// Create chunks from an envelope and an optional data chunk
    pub fn new(envelope: Value, data: Option<Value>) -> Self {
        Self {
            envelope,
            data,
            debug: Vec::new(),
            hop_count: 0,
        }
    }

    /// Attach debug chunks
    pub fn with_debug(mut self, debug: Vec<Value>) -> Self {
        self.debug = debug;
        self
    }

    /// Deserialize the envelope chunk
    pub fn envelope(&self) -> Result<Envelope, ProtocolError> {
        Envelope::from_value(&self.envelope)
    }

    /// Sender recovered from a possibly malformed envelope, empty if unknown
    pub fn sender_hint(&self) -> String {
        self.envelope
            .get("sender")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Message id recovered from a possibly malformed envelope
    pub fn message_id_hint(&self) -> Option<String> {
        self.envelope
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
