//! # Cthun Protocol
//!
//! Message chunks, the RPC request model, outbound payloads and the
//! connector contract shared by the Cthun agent.

#![warn(missing_docs)]

/// Parsed chunks and envelope
pub mod chunks;

/// Request model and outbound message types
pub mod message;

/// Connector contract
pub mod connector;

/// Error types for protocol operations
pub mod error;

pub use chunks::{Envelope, ParsedChunks};
pub use connector::Connector;
pub use error::ProtocolError;
pub use message::{ActionRequest, OutboundMessage, RequestOrigin, RequestType};
