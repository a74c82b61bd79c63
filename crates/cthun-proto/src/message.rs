//! Message types and enums

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::chunks::Envelope;
use crate::error::ProtocolError;

/// Schema of a blocking RPC request
pub const BLOCKING_REQUEST_TYPE: &str = "http://puppetlabs.com/rpc_blocking_request";
/// Schema of a non-blocking RPC request
pub const NON_BLOCKING_REQUEST_TYPE: &str = "http://puppetlabs.com/rpc_non_blocking_request";
/// Schema of a blocking RPC response
pub const BLOCKING_RESPONSE_TYPE: &str = "http://puppetlabs.com/rpc_blocking_response";
/// Schema of a provisional response to a non-blocking request
pub const PROVISIONAL_RESPONSE_TYPE: &str = "http://puppetlabs.com/rpc_provisional_response";
/// Schema of a non-blocking completion notification
pub const NON_BLOCKING_RESPONSE_TYPE: &str = "http://puppetlabs.com/rpc_non_blocking_response";
/// Schema of an RPC-level error
pub const RPC_ERROR_TYPE: &str = "http://puppetlabs.com/rpc_error_message";
/// Schema of a transport-level error
pub const CTHUN_ERROR_TYPE: &str = "http://puppetlabs.com/cthun_error_message";

/// How the requester wants the result delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Result returned in a single response
    Blocking,
    /// Provisional acknowledgment, result persisted as a job
    NonBlocking,
}

impl RequestType {
    /// Map an envelope `message_type` to a request type
    pub fn from_message_type(message_type: &str) -> Option<Self> {
        match message_type {
            BLOCKING_REQUEST_TYPE => Some(Self::Blocking),
            NON_BLOCKING_REQUEST_TYPE => Some(Self::NonBlocking),
            _ => None,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => f.write_str("blocking"),
            Self::NonBlocking => f.write_str("non-blocking"),
        }
    }
}

/// Whatever is known about who to answer, even for a rejected request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    /// Sender URI from the envelope
    pub sender: String,
    /// Transaction id, when the data chunk carried one
    pub transaction_id: Option<String>,
    /// Envelope message id
    pub message_id: Option<String>,
}

impl RequestOrigin {
    /// Recover the origin of a request whose data chunk may be invalid
    pub fn recover(envelope: &Envelope, data: &Value) -> Self {
        Self {
            sender: envelope.sender.clone(),
            transaction_id: data
                .get("transaction_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            message_id: envelope.id.clone(),
        }
    }
}

/// One validated inbound action invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    transaction_id: String,
    request_type: RequestType,
    module: String,
    action: String,
    params: Value,
    notify_outcome: bool,
    sender: String,
    message_id: Option<String>,
}

impl ActionRequest {
    /// Build a request from a deserialized envelope and the raw data chunk
    pub fn parse(
        request_type: RequestType,
        envelope: &Envelope,
        data: &Value,
    ) -> Result<Self, ProtocolError> {
        let fields = data
            .as_object()
            .ok_or_else(|| ProtocolError::InvalidData("data chunk is not an object".to_string()))?;

        let params = match fields.get("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "params",
                    reason: format!("expected an object, got {}", json_kind(other)),
                })
            }
        };

        let notify_outcome = match fields.get("notify_outcome") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "notify_outcome",
                    reason: format!("expected a boolean, got {}", json_kind(other)),
                })
            }
        };

        Ok(Self {
            transaction_id: required_str(fields, "transaction_id")?,
            request_type,
            module: required_str(fields, "module")?,
            action: required_str(fields, "action")?,
            params,
            notify_outcome,
            sender: envelope.sender.clone(),
            message_id: envelope.id.clone(),
        })
    }

    /// Transaction id chosen by the requester
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Blocking or non-blocking
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Target module name
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Target action name
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Action parameters (always a JSON object)
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Whether a completion notification was requested
    pub fn notify_outcome(&self) -> bool {
        self.notify_outcome
    }

    /// Sender URI
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Envelope message id
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Reply addressing for this request
    pub fn origin(&self) -> RequestOrigin {
        RequestOrigin {
            sender: self.sender.clone(),
            transaction_id: Some(self.transaction_id.clone()),
            message_id: self.message_id.clone(),
        }
    }
}

fn required_str(fields: &Map<String, Value>, field: &'static str) -> Result<String, ProtocolError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(ProtocolError::MissingField(field)),
        Some(Value::String(s)) if s.is_empty() => Err(ProtocolError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ProtocolError::InvalidField {
            field,
            reason: format!("expected a string, got {}", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Data chunk of a blocking response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingResponse {
    /// Transaction this answers
    pub transaction_id: String,
    /// Action output
    pub results: Value,
}

/// Data chunk of a provisional response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionalResponse {
    /// Transaction this answers
    pub transaction_id: String,
    /// Job id to query the outcome with
    pub job_id: String,
    /// Job metadata
    pub metadata: Value,
}

/// Data chunk of a non-blocking completion notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonBlockingResponse {
    /// Transaction this answers
    pub transaction_id: String,
    /// Job that completed
    pub job_id: String,
    /// Action output
    pub results: Value,
}

/// Data chunk of an RPC error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorMessage {
    /// Transaction this answers, if it could be recovered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Envelope id of the failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Data chunk of a transport-level error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CthunErrorMessage {
    /// Envelope id of the failed message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Outbound message ready for a transport to wrap and send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Schema identifier of `data`
    pub message_type: String,
    /// Destination URIs
    pub targets: Vec<String>,
    /// Data chunk
    pub data: Value,
    /// Debug chunks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug: Vec<Value>,
}

impl OutboundMessage {
    fn new(message_type: &str, target: &str, data: impl Serialize) -> Self {
        Self {
            message_type: message_type.to_string(),
            targets: vec![target.to_string()],
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            debug: Vec::new(),
        }
    }

    /// Transport-level error addressed to a best-effort destination
    pub fn cthun_error(destination: &str, message_id: Option<String>, description: &str, debug: &[Value]) -> Self {
        let mut message = Self::new(
            CTHUN_ERROR_TYPE,
            destination,
            CthunErrorMessage {
                id: message_id,
                description: description.to_string(),
            },
        );
        message.debug = debug.to_vec();
        message
    }

    /// RPC error
    pub fn rpc_error(origin: &RequestOrigin, description: &str) -> Self {
        Self::new(
            RPC_ERROR_TYPE,
            &origin.sender,
            RpcErrorMessage {
                transaction_id: origin.transaction_id.clone(),
                id: origin.message_id.clone(),
                description: description.to_string(),
            },
        )
    }

    /// Blocking response
    pub fn blocking_response(request: &ActionRequest, results: &Value) -> Self {
        Self::new(
            BLOCKING_RESPONSE_TYPE,
            request.sender(),
            BlockingResponse {
                transaction_id: request.transaction_id().to_string(),
                results: results.clone(),
            },
        )
    }

    /// Provisional response
    pub fn provisional_response(request: &ActionRequest, job_id: &str, metadata: &Value) -> Self {
        Self::new(
            PROVISIONAL_RESPONSE_TYPE,
            request.sender(),
            ProvisionalResponse {
                transaction_id: request.transaction_id().to_string(),
                job_id: job_id.to_string(),
                metadata: metadata.clone(),
            },
        )
    }

    /// Non-blocking completion notification
    pub fn non_blocking_response(request: &ActionRequest, results: &Value, job_id: &str) -> Self {
        Self::new(
            NON_BLOCKING_RESPONSE_TYPE,
            request.sender(),
            NonBlockingResponse {
                transaction_id: request.transaction_id().to_string(),
                job_id: job_id.to_string(),
                results: results.clone(),
            },
        )
    }
}
