//! Error types for protocol operations

use thiserror::Error;

/// Protocol-specific errors raised while decoding inbound chunks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Envelope chunk could not be deserialized
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Message carried a valid envelope but no data chunk
    #[error("Message has no data chunk")]
    MissingData,

    /// Data chunk is not a JSON object
    #[error("Invalid request data: {0}")]
    InvalidData(String),

    /// Required request field is absent or empty
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// Request field is present with the wrong shape
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Offending field name
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

impl ProtocolError {
    /// Whether this error belongs to the transport-level failure domain
    pub fn is_envelope_error(&self) -> bool {
        matches!(self, Self::InvalidEnvelope(_) | Self::MissingData)
    }
}
